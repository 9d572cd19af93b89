//! Multi-destination publishing with deterministic preference order.

use std::sync::Arc;

use tracing::{info, warn};

use pagepress_core::PublishResult;

use crate::destination::{
    BucketConfig, BucketDestination, Destination, StorageZoneConfig, StorageZoneDestination,
};

/// Fans one artifact out to every configured destination.
///
/// Destinations are held in fixed priority order: the storage zone first,
/// then the bucket gateway. Each upload is attempted independently — one
/// destination failing never prevents the next attempt — and the canonical
/// URL is the URL of the first destination in priority order that
/// succeeded.
pub struct Publisher {
    destinations: Vec<Arc<dyn Destination>>,
}

impl Publisher {
    /// Build from an explicit priority-ordered destination list.
    pub fn new(destinations: Vec<Arc<dyn Destination>>) -> Self {
        Self { destinations }
    }

    /// Assemble destinations from the environment.
    ///
    /// Presence of a complete credential set silently enables a
    /// destination; absence silently disables it. The result may be empty —
    /// callers decide whether that is fatal.
    pub fn from_env(client: &reqwest::Client) -> Self {
        let mut destinations: Vec<Arc<dyn Destination>> = Vec::new();

        if let Some(config) = StorageZoneConfig::from_env() {
            destinations.push(Arc::new(StorageZoneDestination::new(config, client.clone())));
        }
        if let Some(config) = BucketConfig::from_env() {
            destinations.push(Arc::new(BucketDestination::new(config, client.clone())));
        }

        Self { destinations }
    }

    /// Whether no destination is configured.
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Destination names in priority order.
    pub fn destination_names(&self) -> Vec<&'static str> {
        self.destinations.iter().map(|d| d.name()).collect()
    }

    /// Upload `bytes` under `key` to every destination, in priority order.
    ///
    /// Returns one result per destination, in the same order.
    pub async fn publish(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Vec<PublishResult> {
        let mut results = Vec::with_capacity(self.destinations.len());

        for destination in &self.destinations {
            match destination.upload(key, bytes, content_type).await {
                Ok(url) => {
                    info!(key, destination = destination.name(), url = %url, "Published");
                    results.push(PublishResult::success(destination.name(), url));
                }
                Err(err) => {
                    warn!(key, destination = destination.name(), error = %err, "Publish failed");
                    results.push(PublishResult::failure(destination.name(), err.to_string()));
                }
            }
        }

        results
    }

    /// The canonical URL: first success in priority order, if any.
    pub fn canonical_url(results: &[PublishResult]) -> Option<&str> {
        results.iter().find(|r| r.ok).and_then(|r| r.url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryDestination;

    #[tokio::test]
    async fn test_publish_attempts_every_destination() {
        let primary = Arc::new(MemoryDestination::new("storage_zone", "https://cdn.example"));
        primary.fail_uploads(true);
        let secondary = Arc::new(MemoryDestination::new("bucket", "https://bucket.example"));

        let publisher = Publisher::new(vec![primary.clone(), secondary.clone()]);
        let results = publisher.publish("articles/a.html", b"<html>", "text/html").await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert!(results[1].ok);
        assert_eq!(secondary.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_canonical_url_prefers_priority_order() {
        let primary = Arc::new(MemoryDestination::new("storage_zone", "https://cdn.example"));
        let secondary = Arc::new(MemoryDestination::new("bucket", "https://bucket.example"));

        let publisher = Publisher::new(vec![primary, secondary]);
        let results = publisher.publish("articles/a.html", b"<html>", "text/html").await;

        assert_eq!(
            Publisher::canonical_url(&results),
            Some("https://cdn.example/articles/a.html")
        );
    }

    #[tokio::test]
    async fn test_canonical_url_falls_back_to_secondary() {
        let primary = Arc::new(MemoryDestination::new("storage_zone", "https://cdn.example"));
        primary.fail_uploads(true);
        let secondary = Arc::new(MemoryDestination::new("bucket", "https://bucket.example"));

        let publisher = Publisher::new(vec![primary, secondary]);
        let results = publisher.publish("articles/a.html", b"<html>", "text/html").await;

        assert_eq!(
            Publisher::canonical_url(&results),
            Some("https://bucket.example/articles/a.html")
        );
    }

    #[tokio::test]
    async fn test_no_canonical_url_when_all_fail() {
        let primary = Arc::new(MemoryDestination::new("storage_zone", "https://cdn.example"));
        primary.fail_uploads(true);
        let secondary = Arc::new(MemoryDestination::new("bucket", "https://bucket.example"));
        secondary.fail_uploads(true);

        let publisher = Publisher::new(vec![primary, secondary]);
        let results = publisher.publish("articles/a.html", b"<html>", "text/html").await;

        assert!(Publisher::canonical_url(&results).is_none());
    }

    #[tokio::test]
    async fn test_empty_publisher_returns_no_results() {
        let publisher = Publisher::new(Vec::new());
        assert!(publisher.is_empty());

        let results = publisher.publish("articles/a.html", b"<html>", "text/html").await;
        assert!(results.is_empty());
        assert!(Publisher::canonical_url(&results).is_none());
    }
}
