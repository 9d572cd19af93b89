//! Pipeline-level errors.
//!
//! Only pre-flight conditions abort a run; everything that happens after
//! item processing begins is recorded per item and never bubbles this far.

use thiserror::Error;

use pagepress_core::SourceError;

/// Fatal errors raised before any item processing begins.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Every destination is unconfigured; there is nowhere to publish.
    #[error("No publish destination is configured")]
    NoDestination,

    /// The job source could not produce a keyword list.
    #[error(transparent)]
    Source(#[from] SourceError),
}
