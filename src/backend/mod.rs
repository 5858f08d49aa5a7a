//! Execution engine and inspector session seam
//!
//! The harness drives an engine it never shares: the [`Backend`] is moved
//! onto the worker thread and launched there, so the [`ExecutionEngine`] it
//! produces needs no `Send` bound. Only the [`InspectSession`] crosses
//! threads, since test code injects inbound messages from its own thread.

pub mod mock;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::harness::MessageSink;

pub use mock::MockBackend;

/// A unit of source handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    name: String,
    text: String,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Name used in diagnostics and call frames
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Identifier of the execution context a session is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier counters scoped to one harness instance
///
/// Every harness starts from fresh counters, so ids seen by a test do not
/// depend on which tests ran before it.
#[derive(Debug, Default)]
pub struct IdCounters {
    context: AtomicU64,
    object: AtomicU64,
}

impl IdCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next execution context id, starting at 1
    pub fn next_context_id(&self) -> ContextId {
        ContextId(self.context.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Next remote object id, starting at 1
    pub fn next_object_id(&self) -> u64 {
        self.object.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Options the backend is launched with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Pause before the first evaluation runs
    pub suspend_on_entry: bool,
}

/// Everything a backend receives at launch
pub struct LaunchContext {
    pub options: LaunchOptions,
    /// Where the session delivers outbound protocol messages
    pub sink: MessageSink,
    pub ids: Arc<IdCounters>,
}

/// Synchronous evaluator owned by the worker thread
pub trait ExecutionEngine {
    type Value: Send + 'static;

    /// Run a unit to completion
    fn eval(&mut self, unit: &SourceUnit) -> Result<Self::Value>;
}

/// Debugging session attached to an engine
pub trait InspectSession: Send + Sync + 'static {
    fn context_id(&self) -> ContextId;

    /// Handle one inbound protocol message
    fn on_message(&self, message: &str) -> Result<()>;

    /// Let an engine paused on the debugger run on without waiting for a
    /// resume, now and for any later pause
    ///
    /// Called when the harness shuts down. Sessions that never block the
    /// engine keep the default.
    fn release(&self) {}

    /// Release the session; called exactly once by the worker
    fn dispose(&self);
}

/// Factory for an engine and its session
pub trait Backend: Send + 'static {
    type Value: Send + 'static;
    type Engine: ExecutionEngine<Value = Self::Value>;
    type Session: InspectSession;

    /// Create the engine and session; runs on the worker thread
    fn launch(self, cx: LaunchContext) -> Result<(Self::Engine, Arc<Self::Session>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_one() {
        let ids = IdCounters::new();
        assert_eq!(ids.next_context_id(), ContextId(1));
        assert_eq!(ids.next_context_id(), ContextId(2));
        assert_eq!(ids.next_object_id(), 1);
    }

    #[test]
    fn test_counters_are_per_instance() {
        let first = IdCounters::new();
        first.next_object_id();
        first.next_object_id();

        let second = IdCounters::new();
        assert_eq!(second.next_object_id(), 1);
    }

    #[test]
    fn test_context_id_display() {
        assert_eq!(ContextId(7).to_string(), "7");
        assert_eq!(serde_json::to_string(&ContextId(7)).unwrap(), "7");
    }
}
