//! Core domain types for a publishing run.
//!
//! A run turns `JobItem`s (keywords) into `Artifact`s, publishes each
//! artifact to zero or more destinations (one `PublishResult` per attempt),
//! and records the canonical location as a `SitemapEntry`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a job item entered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Loaded directly from the job source file.
    Primary,
    /// Produced by batch variation pre-generation.
    Derived,
}

/// Lifecycle state of a job item.
///
/// Transitions are one-way: `Pending` moves to `Succeeded` or `Failed`
/// exactly once and is never reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One unit of work: a keyword to generate, publish, and track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobItem {
    /// The keyword driving generation.
    pub key: String,

    /// Origin of the item.
    pub kind: ItemKind,

    /// Current lifecycle state.
    pub status: ItemStatus,
}

impl JobItem {
    /// Create a pending item for a keyword.
    pub fn new(key: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            key: key.into(),
            kind,
            status: ItemStatus::Pending,
        }
    }

    /// Move a pending item to `Succeeded`. Terminal states are kept as-is.
    pub fn mark_succeeded(&mut self) {
        if self.status == ItemStatus::Pending {
            self.status = ItemStatus::Succeeded;
        }
    }

    /// Move a pending item to `Failed`. Terminal states are kept as-is.
    pub fn mark_failed(&mut self) {
        if self.status == ItemStatus::Pending {
            self.status = ItemStatus::Failed;
        }
    }
}

/// Content returned by the generation service for one keyword.
///
/// `title` and `body_html` are required; the rest default to empty when the
/// service omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPayload {
    /// Page title.
    pub title: String,

    /// Meta description.
    #[serde(default)]
    pub description: String,

    /// Related keywords for the meta keyword list.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Article body as an HTML fragment.
    #[serde(rename = "body")]
    pub body_html: String,
}

/// A generated document ready for publishing.
///
/// The slug `key` is unique within a run (keywords are deduplicated before
/// scheduling) and doubles as the upload key, so republishing the same
/// keyword overwrites the remote object instead of duplicating it. The `id`
/// tags this particular instance for log correlation.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Process-unique instance id.
    pub id: Uuid,

    /// Slug derived from the keyword.
    pub key: String,

    /// Object file name (`{key}.html`).
    pub file_name: String,

    /// Rendered document.
    pub html: String,
}

impl Artifact {
    /// Build an artifact from a slug and rendered document.
    pub fn new(key: impl Into<String>, html: String) -> Self {
        let key = key.into();
        let file_name = format!("{key}.html");
        Self {
            id: Uuid::new_v4(),
            key,
            file_name,
            html,
        }
    }

    /// Remote object key under which the artifact is stored.
    pub fn object_key(&self) -> String {
        format!("articles/{}", self.file_name)
    }
}

/// Outcome of one upload attempt against one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    /// Destination name (stable, used in summaries).
    pub destination: String,

    /// Public URL when the upload succeeded.
    pub url: Option<String>,

    /// Whether the upload succeeded.
    pub ok: bool,

    /// Error description when the upload failed.
    pub error: Option<String>,
}

impl PublishResult {
    /// A successful upload yielding a public URL.
    pub fn success(destination: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            url: Some(url.into()),
            ok: true,
            error: None,
        }
    }

    /// A failed upload attempt.
    pub fn failure(destination: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            url: None,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// One `(loc, lastmod)` record in the published sitemap.
///
/// `loc` is the unique key; a merge keeps at most one entry per `loc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    /// Published URL.
    pub loc: String,

    /// Date of the most recent write that produced this `loc`.
    pub lastmod: NaiveDate,
}

impl SitemapEntry {
    /// Entry stamped with today's date.
    pub fn today(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod: chrono::Utc::now().date_naive(),
        }
    }

    /// Entry with an explicit date.
    pub fn dated(loc: impl Into<String>, lastmod: NaiveDate) -> Self {
        Self {
            loc: loc.into(),
            lastmod,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_item_transitions_are_one_way() {
        let mut item = JobItem::new("rust async runtime", ItemKind::Primary);
        assert_eq!(item.status, ItemStatus::Pending);

        item.mark_succeeded();
        assert_eq!(item.status, ItemStatus::Succeeded);

        // A terminal state never reverts.
        item.mark_failed();
        assert_eq!(item.status, ItemStatus::Succeeded);
    }

    #[test]
    fn test_job_item_failure_is_terminal() {
        let mut item = JobItem::new("broken keyword", ItemKind::Derived);
        item.mark_failed();
        item.mark_succeeded();
        assert_eq!(item.status, ItemStatus::Failed);
    }

    #[test]
    fn test_artifact_object_key() {
        let artifact = Artifact::new("rust-async-runtime", "<html></html>".to_string());
        assert_eq!(artifact.file_name, "rust-async-runtime.html");
        assert_eq!(artifact.object_key(), "articles/rust-async-runtime.html");
    }

    #[test]
    fn test_publish_result_constructors() {
        let ok = PublishResult::success("storage_zone", "https://cdn.example/a.html");
        assert!(ok.ok);
        assert_eq!(ok.url.as_deref(), Some("https://cdn.example/a.html"));
        assert!(ok.error.is_none());

        let err = PublishResult::failure("bucket", "status 503");
        assert!(!err.ok);
        assert!(err.url.is_none());
        assert_eq!(err.error.as_deref(), Some("status 503"));
    }

    #[test]
    fn test_content_payload_optional_fields_default() {
        let payload: ContentPayload =
            serde_json::from_str(r#"{"title": "T", "body": "<p>b</p>"}"#).expect("parse failed");
        assert_eq!(payload.title, "T");
        assert!(payload.description.is_empty());
        assert!(payload.keywords.is_empty());
    }
}
