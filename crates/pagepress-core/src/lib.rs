//! Pagepress Core Library
//!
//! Domain model and local collaborators for the batch publishing engine:
//! job items loaded from tabular keyword sources, content payloads and the
//! document template they are merged into, publish results, and sitemap
//! entries. Network collaborators live in `pagepress-remote`; persistence
//! lives in `pagepress-state`.

pub mod domain;
pub mod error;
pub mod source;
pub mod telemetry;
pub mod template;

pub use domain::{
    Artifact, ContentPayload, ItemKind, ItemStatus, JobItem, PublishResult, SitemapEntry,
};
pub use error::SourceError;
pub use source::load_job_items;
pub use telemetry::init_tracing;
pub use template::{canonical_path, merge_template, slugify, DEFAULT_TEMPLATE};

/// Pagepress version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
