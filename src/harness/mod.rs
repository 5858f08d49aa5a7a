//! Inspector test harness
//!
//! [`InspectorTester`] starts one execution worker per instance, forwards
//! evaluations to it, injects inbound protocol messages into the session and
//! collects everything the session emits so tests can compare it against an
//! expected transcript.
//!
//! ```no_run
//! use inspector_harness::backend::{MockBackend, SourceUnit};
//! use inspector_harness::harness::InspectorTester;
//!
//! # fn main() -> inspector_harness::Result<()> {
//! let tester = InspectorTester::start(MockBackend::new(), false)?;
//! tester.send_message(r#"{"id":1,"method":"Debugger.enable"}"#)?;
//! tester.compare_received_messages("{\"id\":1,\"result\":{}}\n")?;
//! let value = tester.eval(SourceUnit::new("main", "return 42")).wait()?;
//! assert_eq!(value, 42);
//! tester.finish()
//! # }
//! ```

mod buffer;
mod compare;
mod mailbox;
mod pending;
mod worker;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};

use crate::backend::{
    Backend, ContextId, IdCounters, InspectSession, LaunchContext, LaunchOptions, SourceUnit,
};
use crate::common::config::Config;
use crate::common::{Error, Result};

pub use buffer::{MessageBuffer, MessageSink, RECORD_TERMINATOR};
pub use compare::{compare_received, MessageSource};
pub use pending::PendingResult;
pub use worker::WorkerState;

use mailbox::RequestMailbox;

/// How a harness is started
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Pause the session before the first evaluation runs
    pub suspend_on_entry: bool,
    /// Name of the worker thread
    pub thread_name: String,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl HarnessOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            suspend_on_entry: config.harness.suspend_on_entry,
            thread_name: config.harness.worker_thread_name.clone(),
        }
    }
}

/// Harness around one engine + inspector session
pub struct InspectorTester<B: Backend> {
    mailbox: Arc<RequestMailbox<B::Value>>,
    buffer: Arc<MessageBuffer>,
    session: Arc<B::Session>,
    ids: Arc<IdCounters>,
    context_id: ContextId,
    worker: Option<JoinHandle<()>>,
}

impl<B: Backend> InspectorTester<B> {
    /// Start the worker and block until the session is attached
    pub fn start(backend: B, suspend_on_entry: bool) -> Result<Self> {
        Self::start_with(
            backend,
            HarnessOptions {
                suspend_on_entry,
                ..HarnessOptions::default()
            },
        )
    }

    /// Start with options taken from configuration
    pub fn start_with_config(backend: B, config: &Config) -> Result<Self> {
        Self::start_with(backend, HarnessOptions::from_config(config))
    }

    pub fn start_with(backend: B, options: HarnessOptions) -> Result<Self> {
        let mailbox = Arc::new(RequestMailbox::new());
        let buffer = Arc::new(MessageBuffer::new());
        let ids = Arc::new(IdCounters::new());

        let cx = LaunchContext {
            options: LaunchOptions {
                suspend_on_entry: options.suspend_on_entry,
            },
            sink: MessageSink::new(buffer.clone()),
            ids: ids.clone(),
        };

        let (worker, ready) = worker::spawn(
            backend,
            cx,
            &options.thread_name,
            mailbox.clone(),
            buffer.clone(),
        )?;
        debug!(context_id = %ready.context_id, "harness started");

        Ok(Self {
            mailbox,
            buffer,
            session: ready.session,
            ids,
            context_id: ready.context_id,
            worker: Some(worker),
        })
    }

    /// Stop the worker and wait until the session is disposed
    ///
    /// An evaluation still running is allowed to complete first. An engine
    /// paused on the debugger is released rather than waited on.
    pub fn finish(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.mailbox.terminate();
        self.session.release();
        if std::thread::panicking() {
            // The worker stops and disposes the session on its own.
            debug!(
                context_id = %self.context_id,
                "harness dropped while panicking; not joining worker"
            );
            return Ok(());
        }
        worker
            .join()
            .map_err(|_| Error::Internal("execution worker panicked".to_string()))?;
        debug!(context_id = %self.context_id, "harness finished");
        Ok(())
    }

    /// Execution context the session is attached to
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    /// Identifier counters of this harness
    pub fn ids(&self) -> &IdCounters {
        &self.ids
    }

    pub fn worker_state(&self) -> WorkerState {
        self.mailbox.state()
    }

    /// Queue `unit` for evaluation on the worker
    ///
    /// Returns immediately. Await each result before the next `eval`: the
    /// mailbox holds one request, and an unclaimed one is replaced (its
    /// result fails with [`Error::Superseded`]).
    pub fn eval(&self, unit: SourceUnit) -> PendingResult<B::Value> {
        trace!(unit = unit.name(), "submitting evaluation");
        self.mailbox.submit(unit)
    }

    /// Inject an inbound protocol message into the session
    pub fn send_message(&self, message: &str) -> Result<()> {
        trace!(message_text = message, "inbound message");
        self.session.on_message(message)
    }

    /// Remove and return everything received so far
    ///
    /// With `wait_for_some`, blocks until at least one message has arrived.
    pub fn get_messages(&self, wait_for_some: bool) -> Result<String> {
        self.buffer.drain(wait_for_some, 0)
    }

    /// Like `get_messages(true)`, but gives up after `timeout`
    pub fn get_messages_timeout(&self, timeout: Duration) -> Result<String> {
        self.buffer.drain_timeout(0, timeout)
    }

    /// Check that exactly `expected` is received next
    ///
    /// Tolerates any fragmentation of the incoming text. Blocks until the
    /// whole expected text has arrived; on divergence fails with
    /// [`Error::MessageMismatch`] carrying the expected and received text.
    pub fn compare_received_messages(&self, expected: &str) -> Result<()> {
        compare_received(&*self.buffer, expected, None)
    }

    /// Like [`Self::compare_received_messages`], bounding each wait
    pub fn compare_received_messages_within(
        &self,
        expected: &str,
        timeout: Duration,
    ) -> Result<()> {
        compare_received(&*self.buffer, expected, Some(timeout))
    }
}

impl<B: Backend> Drop for InspectorTester<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "harness shutdown failed");
        }
    }
}
