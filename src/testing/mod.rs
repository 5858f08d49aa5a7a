//! Scenario test runner
//!
//! Reads YAML test scenarios and plays them against an inspector harness
//! backed by the mock engine. Message expectations go through the
//! fragmentation-tolerant comparator, so scenarios state the transcript
//! they expect rather than how it happens to be chunked.

mod config;
mod runner;

pub use config::*;
pub use runner::{run, run_scenario, TestResult};
