//! Search-engine indexing notification.
//!
//! One call per URL, issued strictly sequentially with a fixed inter-call
//! delay to respect an external rate limit the endpoint itself does not
//! enforce. An internal async mutex serialises callers, so the contract
//! holds even while items publish concurrently.

use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{RemoteError, RemoteResult};

/// What happened to the URL being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Content at the URL was created or updated.
    Updated,
    /// Content at the URL was removed.
    Deleted,
}

impl ChangeKind {
    /// Wire value for the notification body.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Updated => "URL_UPDATED",
            ChangeKind::Deleted => "URL_DELETED",
        }
    }
}

/// Indexing endpoint configuration.
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// Notification endpoint.
    pub endpoint: String,
    /// Bearer token.
    pub token: String,
    /// Fixed delay between consecutive calls, in milliseconds.
    pub delay_ms: u64,
}

impl IndexingConfig {
    /// Read the `PAGEPRESS_INDEXING_*` variable set.
    ///
    /// Returns `None` unless both endpoint and token are present — the
    /// notifier is an optional feature, gated entirely by configuration.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("PAGEPRESS_INDEXING_ENDPOINT").ok()?;
        let token = std::env::var("PAGEPRESS_INDEXING_TOKEN").ok()?;
        let delay_ms = std::env::var("PAGEPRESS_INDEXING_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        Some(Self {
            endpoint,
            token,
            delay_ms,
        })
    }
}

/// Rate-limited indexing notifier.
pub struct IndexingNotifier {
    config: IndexingConfig,
    client: reqwest::Client,
    gate: Mutex<()>,
}

impl IndexingNotifier {
    /// Create a notifier on a shared HTTP client.
    pub fn new(config: IndexingConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            gate: Mutex::new(()),
        }
    }

    /// Ask the search engine to (re)crawl `url`.
    ///
    /// Failures are independent per call and never fatal to the run;
    /// callers log and move on.
    pub async fn notify(&self, url: &str, kind: ChangeKind) -> RemoteResult<()> {
        // Hold the gate across the call and the cool-down so concurrent
        // items cannot interleave notifications.
        let _gate = self.gate.lock().await;

        let outcome = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.token)
            .json(&json!({ "url": url, "type": kind.as_str() }))
            .send()
            .await;

        let result = match outcome {
            Ok(response) if response.status().is_success() => {
                debug!(url, kind = kind.as_str(), "Indexing notified");
                Ok(())
            }
            Ok(response) => Err(RemoteError::Notification {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            }),
            Err(err) => Err(RemoteError::Notification {
                url: url.to_string(),
                reason: err.to_string(),
            }),
        };

        if let Err(err) = &result {
            warn!(url, error = %err, "Indexing notification failed");
        }

        tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_wire_values() {
        assert_eq!(ChangeKind::Updated.as_str(), "URL_UPDATED");
        assert_eq!(ChangeKind::Deleted.as_str(), "URL_DELETED");
    }
}
