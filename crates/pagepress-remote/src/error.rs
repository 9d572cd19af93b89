//! Error types for external collaborators.
//!
//! All of these are recoverable at the run level: they are caught at the
//! narrowest stage, recorded against the specific item or destination, and
//! processing continues.

use thiserror::Error;

/// Result type for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Errors raised by generation, publishing, and notification.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Single-keyword generation failed.
    #[error("Content generation failed for '{keyword}': {reason}")]
    Generation { keyword: String, reason: String },

    /// A batch response failed the structural check.
    #[error("Batch response failed validation: {0}")]
    InvalidBatch(String),

    /// A batch kept failing after all retries.
    #[error("Batch generation exhausted {attempts} attempts: {reason}")]
    BatchExhausted { attempts: u32, reason: String },

    /// One destination rejected an upload. Other destinations are still
    /// attempted.
    #[error("Upload to {destination} failed: {reason}")]
    Publish { destination: String, reason: String },

    /// An indexing notification failed. Never blocks the run.
    #[error("Indexing notification failed for {url}: {reason}")]
    Notification { url: String, reason: String },

    /// Transport-level HTTP failure.
    #[error("HTTP transport error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err.to_string())
    }
}
