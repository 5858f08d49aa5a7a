//! Scripted in-process backend
//!
//! Stands in for a real engine and inspector session in tests. The engine
//! runs the line scripts described in [`script`], reporting console output
//! through the session; the session answers a handful of inspector requests
//! and lets a paused engine resume.

pub mod messages;
pub mod script;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::backend::{
    Backend, ContextId, ExecutionEngine, IdCounters, InspectSession, LaunchContext, SourceUnit,
};
use crate::common::{Error, Result};
use crate::harness::MessageSink;

use messages::RemoteObject;
use script::Statement;

/// Name the execution context is announced with
pub const CONTEXT_NAME: &str = "harness";

/// Counters observable after the backend was moved into a harness
#[derive(Debug, Default)]
pub struct MockStats {
    disposals: AtomicUsize,
    evaluations: AtomicUsize,
}

impl MockStats {
    /// How many times the session was disposed
    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }

    /// How many units the engine was asked to evaluate
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

/// Backend producing a [`MockEngine`] and [`MockSession`]
#[derive(Debug, Default)]
pub struct MockBackend {
    stats: Arc<MockStats>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counters; grab them before handing the backend to a harness
    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl Backend for MockBackend {
    type Value = Value;
    type Engine = MockEngine;
    type Session = MockSession;

    fn launch(self, cx: LaunchContext) -> Result<(MockEngine, Arc<MockSession>)> {
        let context_id = cx.ids.next_context_id();
        let gate = Arc::new(PauseGate::default());

        let session = Arc::new(MockSession {
            context_id,
            sink: cx.sink.clone(),
            gate: gate.clone(),
            disposed: AtomicBool::new(false),
            stats: self.stats.clone(),
        });
        let engine = MockEngine {
            context_id,
            sink: cx.sink,
            ids: cx.ids,
            gate,
            break_on_start: cx.options.suspend_on_entry,
            stats: self.stats,
        };

        debug!(%context_id, "mock backend launched");
        Ok((engine, session))
    }
}

/// Where a paused engine waits for the debugger
#[derive(Debug, Default)]
struct PauseGate {
    state: Mutex<GateState>,
    resumed: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    paused: bool,
    /// Set on release; pauses no longer block
    released: bool,
}

impl PauseGate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Script engine; lives on the worker thread
pub struct MockEngine {
    context_id: ContextId,
    sink: MessageSink,
    ids: Arc<IdCounters>,
    gate: Arc<PauseGate>,
    break_on_start: bool,
    stats: Arc<MockStats>,
}

impl MockEngine {
    /// Announce the pause, then block until the session resumes us
    fn pause(&self, reason: &str, unit: &SourceUnit, line: usize) -> Result<()> {
        let mut gate = self.gate.lock();
        if gate.released {
            debug!(unit = unit.name(), line, "session released; not pausing");
            return Ok(());
        }
        gate.paused = true;
        // Sent under the gate lock so a resume cannot overtake it.
        self.sink.send(&messages::paused(reason, unit.name(), line)?);
        while gate.paused {
            gate = self
                .gate
                .resumed
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

impl ExecutionEngine for MockEngine {
    type Value = Value;

    fn eval(&mut self, unit: &SourceUnit) -> Result<Value> {
        self.stats.evaluations.fetch_add(1, Ordering::SeqCst);
        let lines = script::parse(unit)?;

        if std::mem::take(&mut self.break_on_start) {
            let line = lines.first().map(|l| l.number).unwrap_or(0);
            self.pause("Break on start", unit, line)?;
        }

        for line in lines {
            match line.statement {
                Statement::Print(text) => {
                    self.sink
                        .send(&messages::console_log(self.context_id, &text)?);
                }
                Statement::Inspect(value) => {
                    let object = RemoteObject::object(&value, self.ids.next_object_id());
                    self.sink
                        .send(&messages::console_api_called(self.context_id, vec![object])?);
                }
                Statement::Throw(message) => {
                    return Err(Error::evaluation_failed(unit.name(), &message));
                }
                Statement::Panic(message) => panic!("{message}"),
                Statement::Sleep(duration) => std::thread::sleep(duration),
                Statement::Pause => self.pause("other", unit, line.number)?,
                Statement::Return(value) => return Ok(value),
            }
        }

        Ok(Value::Null)
    }
}

/// Inspector session answering requests over the sink
pub struct MockSession {
    context_id: ContextId,
    sink: MessageSink,
    gate: Arc<PauseGate>,
    disposed: AtomicBool,
    stats: Arc<MockStats>,
}

impl MockSession {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn handle(&self, request: messages::Request) -> Result<()> {
        match request.method.as_str() {
            "Runtime.enable" => {
                self.sink.send(&messages::execution_context_created(
                    self.context_id,
                    CONTEXT_NAME,
                )?);
                self.sink.send(&messages::empty_result(request.id)?);
            }
            "Runtime.disable"
            | "Runtime.runIfWaitingForDebugger"
            | "Debugger.enable"
            | "Debugger.disable" => {
                self.sink.send(&messages::empty_result(request.id)?);
            }
            "Debugger.resume" => self.resume(request.id)?,
            other => {
                self.sink.send(&messages::error(
                    Some(request.id),
                    messages::METHOD_NOT_FOUND,
                    &format!("'{other}' wasn't found"),
                )?);
            }
        }
        Ok(())
    }

    fn resume(&self, id: u64) -> Result<()> {
        let mut gate = self.gate.lock();
        if !gate.paused {
            self.sink.send(&messages::error(
                Some(id),
                messages::SERVER_ERROR,
                "Can only perform operation while paused.",
            )?);
            return Ok(());
        }
        // Reply before releasing the engine so its output follows ours.
        self.sink.send(&messages::empty_result(id)?);
        self.sink.send(&messages::resumed()?);
        gate.paused = false;
        self.gate.resumed.notify_all();
        Ok(())
    }
}

impl InspectSession for MockSession {
    fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn on_message(&self, message: &str) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::SessionDisposed);
        }
        match serde_json::from_str::<messages::Request>(message) {
            Ok(request) => self.handle(request),
            Err(e) => {
                debug!(error = %e, "unparseable inbound message");
                self.sink.send(&messages::error(
                    None,
                    messages::PARSE_ERROR,
                    &format!("Message must be a valid JSON: {e}"),
                )?);
                Ok(())
            }
        }
    }

    fn release(&self) {
        let mut gate = self.gate.lock();
        gate.released = true;
        if gate.paused {
            debug!(context_id = %self.context_id, "releasing paused engine");
            gate.paused = false;
            self.gate.resumed.notify_all();
        }
    }

    fn dispose(&self) {
        self.stats.disposals.fetch_add(1, Ordering::SeqCst);
        if self.disposed.swap(true, Ordering::SeqCst) {
            debug!(context_id = %self.context_id, "session already disposed");
        }
    }
}
