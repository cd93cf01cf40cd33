//! Error type for compression jobs.

use std::time::Duration;

use crate::process::ProcessError;

/// A compression job that did not produce a result. `Display` is the
/// human-readable message a host shows before falling back to rule-based
/// optimization.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("compression rate must be in (0, 1], got {0}")]
    InvalidRate(f64),
    #[error("interpreter not found: {0}")]
    InterpreterMissing(String),
    #[error("failed to start compression process: {0}")]
    Spawn(String),
    /// Non-zero exit; `message` is the script's `error` field or its raw stderr.
    #[error("{message}")]
    Failed { code: Option<i32>, message: String },
    #[error("failed to parse compression result: {0}")]
    MalformedResponse(String),
    #[error("compression timed out after {0:?}")]
    TimedOut(Duration),
    #[error("compression cancelled")]
    Cancelled,
    #[error("compression process i/o: {0}")]
    Io(String),
    #[error("failed to encode compression request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<ProcessError> for CompressionError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound(program) => CompressionError::InterpreterMissing(program),
            ProcessError::Spawn { program, source } => {
                CompressionError::Spawn(format!("{}: {}", program, source))
            }
            ProcessError::Io(e) => CompressionError::Io(e.to_string()),
            ProcessError::TimedOut(limit) => CompressionError::TimedOut(limit),
            ProcessError::Cancelled => CompressionError::Cancelled,
        }
    }
}
