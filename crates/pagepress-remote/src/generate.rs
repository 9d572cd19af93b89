//! Content generation client.
//!
//! Single-item mode makes one call per keyword. Batch mode requests `V`
//! variations for each of `K` keywords in one call and validates the
//! response structurally; a structurally broken response is retried with
//! linearly increasing backoff, and exhausting the retries fails the whole
//! batch — partial credit exists only inside a valid response, where a
//! keyword's variation array may run short of `V` down to the configured
//! `min_fill` fraction.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use pagepress_core::ContentPayload;

use crate::error::{RemoteError, RemoteResult};

/// Retries after the first batch attempt.
pub const MAX_BATCH_RETRIES: u32 = 3;

/// Generation service configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Service base URL.
    pub endpoint: String,

    /// Optional model override forwarded to the service.
    pub model: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Minimum acceptable fraction of requested variations per keyword in
    /// a batch response. Below this the response fails structurally; at or
    /// above it a short array is accepted with a warning.
    pub min_fill: f32,

    /// Base unit for the linear retry backoff, in milliseconds.
    pub retry_base_ms: u64,
}

impl GeneratorConfig {
    /// Create a config for an endpoint with defaults for the rest.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: None,
            timeout_secs: 120,
            min_fill: 0.5,
            retry_base_ms: 500,
        }
    }

    /// Read configuration from `PAGEPRESS_GENERATOR_*` variables.
    ///
    /// Returns `None` when `PAGEPRESS_GENERATOR_URL` is unset.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("PAGEPRESS_GENERATOR_URL").ok()?;
        let mut config = Self::new(endpoint);
        config.model = std::env::var("PAGEPRESS_GENERATOR_MODEL").ok();
        if let Ok(timeout) = std::env::var("PAGEPRESS_GENERATOR_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                config.timeout_secs = timeout;
            }
        }
        Some(config)
    }

    /// Override the batch under-fill tolerance.
    pub fn with_min_fill(mut self, min_fill: f32) -> Self {
        self.min_fill = min_fill;
        self
    }
}

/// Boundary to the external generation service.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate content for one keyword.
    async fn generate(&self, keyword: &str) -> RemoteResult<ContentPayload>;

    /// Generate `variations` payloads for each keyword in one call.
    ///
    /// Either every requested keyword comes back with a usable variation
    /// array, or the whole batch fails.
    async fn generate_batch(
        &self,
        keywords: &[String],
        variations: usize,
    ) -> RemoteResult<BTreeMap<String, Vec<ContentPayload>>>;
}

/// HTTP implementation of [`ContentGenerator`].
pub struct HttpGenerator {
    config: GeneratorConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    /// Create a generator on a shared HTTP client.
    pub fn new(config: GeneratorConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn request_batch(&self, keywords: &[String], variations: usize) -> RemoteResult<Value> {
        let url = format!("{}/generate/batch", self.config.endpoint.trim_end_matches('/'));
        let body = json!({
            "keywords": keywords,
            "variations": variations,
            "model": self.config.model,
        });

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::InvalidBatch(format!("service returned {status}")));
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate(&self, keyword: &str) -> RemoteResult<ContentPayload> {
        let url = format!("{}/generate", self.config.endpoint.trim_end_matches('/'));
        let body = json!({
            "keyword": keyword,
            "model": self.config.model,
        });

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|err| RemoteError::Generation {
                keyword: keyword.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Generation {
                keyword: keyword.to_string(),
                reason: format!("service returned {status}"),
            });
        }

        let payload: ContentPayload =
            response
                .json()
                .await
                .map_err(|err| RemoteError::Generation {
                    keyword: keyword.to_string(),
                    reason: format!("malformed payload: {err}"),
                })?;

        if payload.title.trim().is_empty() || payload.body_html.trim().is_empty() {
            return Err(RemoteError::Generation {
                keyword: keyword.to_string(),
                reason: "payload missing title or body".to_string(),
            });
        }

        debug!(keyword, title = %payload.title, "Generated content");
        Ok(payload)
    }

    async fn generate_batch(
        &self,
        keywords: &[String],
        variations: usize,
    ) -> RemoteResult<BTreeMap<String, Vec<ContentPayload>>> {
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=MAX_BATCH_RETRIES {
            if attempt > 0 {
                // Linear backoff: base, 2*base, 3*base.
                let delay = Duration::from_millis(self.config.retry_base_ms * attempt as u64);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying batch");
                tokio::time::sleep(delay).await;
            }

            match self.request_batch(keywords, variations).await {
                Ok(value) => {
                    match validate_batch(&value, keywords, variations, self.config.min_fill) {
                        Ok(map) => return Ok(map),
                        Err(err) => {
                            warn!(attempt, error = %err, "Batch response failed validation");
                            last_error = err.to_string();
                        }
                    }
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Batch request failed");
                    last_error = err.to_string();
                }
            }
        }

        Err(RemoteError::BatchExhausted {
            attempts: MAX_BATCH_RETRIES + 1,
            reason: last_error,
        })
    }
}

/// Structural check of a batch response.
///
/// The response must hold a `results` object keyed by every requested
/// keyword, each value an array of payload records with title and body.
/// Arrays shorter than requested are accepted with a warning while the
/// fill ratio stays at or above `min_fill`; below that the response is
/// rejected so the retry path can run.
pub fn validate_batch(
    value: &Value,
    keywords: &[String],
    variations: usize,
    min_fill: f32,
) -> RemoteResult<BTreeMap<String, Vec<ContentPayload>>> {
    let results = value
        .get("results")
        .and_then(Value::as_object)
        .ok_or_else(|| RemoteError::InvalidBatch("missing 'results' object".to_string()))?;

    let required = ((variations as f32) * min_fill).ceil().max(1.0) as usize;
    let mut validated = BTreeMap::new();

    for keyword in keywords {
        let records = results
            .get(keyword)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                RemoteError::InvalidBatch(format!("keyword '{keyword}' missing from response"))
            })?;

        let mut payloads = Vec::with_capacity(records.len());
        for record in records {
            let payload: ContentPayload =
                serde_json::from_value(record.clone()).map_err(|err| {
                    RemoteError::InvalidBatch(format!(
                        "keyword '{keyword}' has a malformed variation: {err}"
                    ))
                })?;
            if payload.title.trim().is_empty() || payload.body_html.trim().is_empty() {
                return Err(RemoteError::InvalidBatch(format!(
                    "keyword '{keyword}' has a variation missing title or body"
                )));
            }
            payloads.push(payload);
        }

        if payloads.len() < required {
            return Err(RemoteError::InvalidBatch(format!(
                "keyword '{keyword}' returned {} of {} variations (minimum {})",
                payloads.len(),
                variations,
                required
            )));
        }
        if payloads.len() < variations {
            warn!(
                keyword = %keyword,
                received = payloads.len(),
                requested = variations,
                "Batch under-filled, accepting"
            );
        }

        validated.insert(keyword.clone(), payloads);
    }

    Ok(validated)
}
