//! Error types for the persistence layer.

use thiserror::Error;

/// Result type for persistence operations
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Errors that can occur while reading or writing run state.
///
/// All of these are recoverable at the run level: a failed persist degrades
/// resumability for the current run but never undoes published work.
#[derive(Error, Debug)]
pub enum StateError {
    /// Filesystem failure
    #[error("State I/O failed: {0}")]
    Io(String),

    /// Serialization failure
    #[error("State serialization failed: {0}")]
    Serialization(String),

    /// Atomic replace of the target file failed
    #[error("State persist failed for {path}: {reason}")]
    Persist { path: String, reason: String },
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}
