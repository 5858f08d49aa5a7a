//! Inspector harness - deterministic testing of inspector sessions
//!
//! This library runs a single-threaded execution engine on a dedicated
//! worker thread and verifies the asynchronous protocol messages its
//! debugging session emits, regardless of how they are fragmented.

pub mod backend;
pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;
pub mod testing;

// Re-export commonly used types for tests
pub use backend::{ContextId, MockBackend, SourceUnit};
pub use common::{Error, Result};
pub use harness::{InspectorTester, PendingResult};
