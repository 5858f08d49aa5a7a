//! Execution worker
//!
//! One dedicated thread launches the backend, owns the engine for its whole
//! life and runs requests from the mailbox one at a time. The engine never
//! leaves this thread.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, error, info};

use crate::backend::{
    Backend, ContextId, ExecutionEngine, InspectSession, LaunchContext, SourceUnit,
};
use crate::common::{Error, Result};

use super::buffer::MessageBuffer;
use super::mailbox::RequestMailbox;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Launching engine and session
    Starting,
    /// Idle until a request or termination arrives
    WaitingForWork,
    /// Running a request
    Executing,
    /// Loop exited, session being disposed
    Terminating,
    /// Thread finished
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::WaitingForWork => write!(f, "waiting"),
            Self::Executing => write!(f, "executing"),
            Self::Terminating => write!(f, "terminating"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// What the worker reports back once it is ready
pub(crate) struct Ready<S> {
    pub session: Arc<S>,
    pub context_id: ContextId,
}

/// Spawn the worker and block until it is ready to take requests
pub(crate) fn spawn<B: Backend>(
    backend: B,
    cx: LaunchContext,
    thread_name: &str,
    mailbox: Arc<RequestMailbox<B::Value>>,
    buffer: Arc<MessageBuffer>,
) -> Result<(JoinHandle<()>, Ready<B::Session>)> {
    // Single permit: the worker signals readiness (or failure) exactly once.
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

    let thread = thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || run(backend, cx, &mailbox, &buffer, ready_tx))
        .map_err(Error::WorkerSpawn)?;

    match ready_rx.recv() {
        Ok(Ok(ready)) => Ok((thread, ready)),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            let _ = thread.join();
            Err(Error::BackendLaunch(
                "worker exited before signalling readiness".to_string(),
            ))
        }
    }
}

/// Stops the worker's surroundings however the loop is left
struct StopGuard<'a, V, S: InspectSession> {
    session: Arc<S>,
    mailbox: &'a RequestMailbox<V>,
    buffer: &'a MessageBuffer,
}

impl<V, S: InspectSession> Drop for StopGuard<'_, V, S> {
    fn drop(&mut self) {
        info!(context_id = %self.session.context_id(), "disposing inspector session");
        self.session.dispose();
        self.mailbox.mark_stopped();
        self.buffer.close();
    }
}

fn run<B: Backend>(
    backend: B,
    cx: LaunchContext,
    mailbox: &RequestMailbox<B::Value>,
    buffer: &MessageBuffer,
    ready: Sender<Result<Ready<B::Session>>>,
) {
    debug!(suspend_on_entry = cx.options.suspend_on_entry, "launching backend");
    let (mut engine, session) = match backend.launch(cx) {
        Ok(launched) => launched,
        Err(e) => {
            error!(error = %e, "backend launch failed");
            mailbox.mark_stopped();
            buffer.close();
            let _ = ready.send(Err(e));
            return;
        }
    };

    let _guard = StopGuard {
        session: session.clone(),
        mailbox,
        buffer,
    };

    let context_id = session.context_id();
    info!(%context_id, "execution worker ready");
    let _ = ready.send(Ok(Ready {
        session,
        context_id,
    }));

    while let Some(request) = mailbox.next() {
        debug!(unit = request.unit.name(), "evaluating");
        let outcome = execute(&mut engine, &request.unit);
        if let Err(e) = &outcome {
            debug!(unit = request.unit.name(), error = %e, "evaluation failed");
        }
        // The caller may have dropped its PendingResult.
        let _ = request.result.send(outcome);
    }

    debug!("execution worker terminating");
}

/// Run one unit, turning engine panics into failures
fn execute<E: ExecutionEngine>(engine: &mut E, unit: &SourceUnit) -> Result<E::Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.eval(unit))) {
        Ok(outcome) => outcome,
        Err(payload) => Err(Error::EvaluationPanicked {
            unit: unit.name().to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::backend::{IdCounters, LaunchOptions};
    use crate::harness::MessageSink;

    /// Engine echoing the unit text, failing on "fail" and panicking on "panic"
    struct EchoEngine;

    impl ExecutionEngine for EchoEngine {
        type Value = String;

        fn eval(&mut self, unit: &SourceUnit) -> Result<String> {
            match unit.text() {
                "fail" => Err(Error::evaluation_failed(unit.name(), "asked to fail")),
                "panic" => panic!("asked to panic"),
                text => Ok(text.to_string()),
            }
        }
    }

    struct CountingSession {
        disposals: Arc<AtomicUsize>,
    }

    impl InspectSession for CountingSession {
        fn context_id(&self) -> ContextId {
            ContextId(9)
        }

        fn on_message(&self, _message: &str) -> Result<()> {
            Ok(())
        }

        fn dispose(&self) {
            self.disposals.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct EchoBackend {
        disposals: Arc<AtomicUsize>,
        fail_launch: bool,
    }

    impl Backend for EchoBackend {
        type Value = String;
        type Engine = EchoEngine;
        type Session = CountingSession;

        fn launch(self, _cx: LaunchContext) -> Result<(EchoEngine, Arc<CountingSession>)> {
            if self.fail_launch {
                return Err(Error::BackendLaunch("no engine".to_string()));
            }
            Ok((
                EchoEngine,
                Arc::new(CountingSession {
                    disposals: self.disposals,
                }),
            ))
        }
    }

    fn start(
        fail_launch: bool,
    ) -> (
        Result<(JoinHandle<()>, Ready<CountingSession>)>,
        Arc<RequestMailbox<String>>,
        Arc<AtomicUsize>,
    ) {
        let disposals = Arc::new(AtomicUsize::new(0));
        let mailbox = Arc::new(RequestMailbox::new());
        let buffer = Arc::new(MessageBuffer::new());
        let cx = LaunchContext {
            options: LaunchOptions::default(),
            sink: MessageSink::new(buffer.clone()),
            ids: Arc::new(IdCounters::new()),
        };
        let backend = EchoBackend {
            disposals: disposals.clone(),
            fail_launch,
        };
        let started = spawn(backend, cx, "test-worker", mailbox.clone(), buffer);
        (started, mailbox, disposals)
    }

    #[test]
    fn test_failures_and_panics_do_not_stop_the_loop() {
        let (started, mailbox, disposals) = start(false);
        let (thread, ready) = started.unwrap();
        assert_eq!(ready.context_id, ContextId(9));

        let failed = mailbox.submit(SourceUnit::new("f", "fail")).wait();
        assert!(matches!(failed, Err(Error::EvaluationFailed { .. })));

        let panicked = mailbox.submit(SourceUnit::new("p", "panic")).wait();
        assert!(
            matches!(panicked, Err(Error::EvaluationPanicked { message, .. }) if message == "asked to panic")
        );

        let ok = mailbox.submit(SourceUnit::new("o", "still alive")).wait();
        assert_eq!(ok.unwrap(), "still alive");

        mailbox.terminate();
        thread.join().unwrap();
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert_eq!(mailbox.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_launch_failure_is_reported_to_starter() {
        let (started, mailbox, disposals) = start(true);
        assert!(matches!(started, Err(Error::BackendLaunch(_))));
        assert_eq!(disposals.load(Ordering::SeqCst), 0);
        assert_eq!(mailbox.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WorkerState::WaitingForWork.to_string(), "waiting");
        assert_eq!(WorkerState::Stopped.to_string(), "stopped");
    }
}
