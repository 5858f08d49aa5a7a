//! Error types for the inspector harness
//!
//! Failure messages carry the texts involved (expected vs. received, what
//! was still outstanding) so a failing test explains itself.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the inspector harness
#[derive(Error, Debug)]
pub enum Error {
    // === Evaluation Errors ===
    #[error("Evaluation of '{unit}' failed: {message}")]
    EvaluationFailed { unit: String, message: String },

    #[error("Evaluation of '{unit}' panicked: {message}")]
    EvaluationPanicked { unit: String, message: String },

    #[error("Request for '{0}' was replaced by a newer submission before the worker claimed it")]
    Superseded(String),

    #[error("Timed out after {0} ms waiting for an evaluation result")]
    ResultTimeout(u64),

    // === Worker Errors ===
    #[error("Execution worker has stopped")]
    WorkerStopped,

    #[error("Failed to spawn execution worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("Backend failed to launch: {0}")]
    BackendLaunch(String),

    // === Session Errors ===
    #[error("Inspector session has been disposed")]
    SessionDisposed,

    // === Message Stream Errors ===
    #[error("Received messages differ from expected\n  expected: {expected:?}\n  actual:   {actual:?}")]
    MessageMismatch { expected: String, actual: String },

    #[error("Interrupted while {remaining:?} remains to be received")]
    Interrupted { remaining: String },

    #[error("Timed out after {millis} ms while {remaining:?} remains to be received")]
    ReceiveTimeout { remaining: String, millis: u64 },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an evaluation failed error
    pub fn evaluation_failed(unit: &str, message: &str) -> Self {
        Self::EvaluationFailed {
            unit: unit.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a message mismatch error
    pub fn message_mismatch(expected: &str, actual: &str) -> Self {
        Self::MessageMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Attach the still-outstanding text to a drain failure
    ///
    /// Drains know nothing about what a caller is waiting for; the
    /// comparator fills that in before reporting.
    pub fn with_remaining(self, remaining: &str) -> Self {
        match self {
            Self::Interrupted { .. } => Self::Interrupted {
                remaining: remaining.to_string(),
            },
            Self::ReceiveTimeout { millis, .. } => Self::ReceiveTimeout {
                remaining: remaining.to_string(),
                millis,
            },
            other => other,
        }
    }

    /// Whether this error is an execution failure delivered on a result
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(
            self,
            Self::EvaluationFailed { .. } | Self::EvaluationPanicked { .. }
        )
    }
}
