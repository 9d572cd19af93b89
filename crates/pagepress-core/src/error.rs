//! Error types for job source loading.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while reading the job source file.
///
/// Every variant aborts the run before any item processing begins; there is
/// no per-item recovery from a broken source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source file does not exist.
    #[error("Job source not found: {0}")]
    NotFound(PathBuf),

    /// File extension is not one of the supported tabular encodings.
    #[error("Unsupported job source format '{0}' (expected .csv or .tsv)")]
    UnsupportedFormat(String),

    /// No `keyword` column in the header row.
    #[error("Job source has no 'keyword' column")]
    MissingKeywordColumn,

    /// File parsed but produced zero usable keywords.
    #[error("Job source contains no keywords")]
    Empty,

    /// Underlying I/O failure.
    #[error("Failed to read job source: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed tabular data.
    #[error("Failed to parse job source: {0}")]
    Csv(#[from] csv::Error),
}
