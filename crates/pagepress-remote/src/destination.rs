//! Publish destinations: key-addressed object storage over HTTP.
//!
//! A destination is enabled by the presence of its complete credential set
//! and silently disabled otherwise — a partial set never half-enables one.
//! Uploads are keyed by logical name; repeating an upload with the same key
//! overwrites the remote object.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};

/// A single publish target.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable destination name used in results and summaries.
    fn name(&self) -> &'static str;

    /// Upload `bytes` under `key`, returning the public URL on success.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> RemoteResult<String>;
}

// ---------------------------------------------------------------------------
// StorageZoneDestination — CDN storage zone
// ---------------------------------------------------------------------------

/// CDN storage zone credentials.
#[derive(Debug, Clone)]
pub struct StorageZoneConfig {
    /// Storage API endpoint.
    pub endpoint: String,
    /// Zone name.
    pub zone: String,
    /// Write access key.
    pub access_key: String,
    /// Public base URL the CDN serves the zone from.
    pub public_base: String,
}

impl StorageZoneConfig {
    /// Read the `PAGEPRESS_STORAGE_*` variable set.
    ///
    /// Returns `None` unless all four variables are present.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            endpoint: std::env::var("PAGEPRESS_STORAGE_ENDPOINT").ok()?,
            zone: std::env::var("PAGEPRESS_STORAGE_ZONE").ok()?,
            access_key: std::env::var("PAGEPRESS_STORAGE_KEY").ok()?,
            public_base: std::env::var("PAGEPRESS_STORAGE_PUBLIC_BASE").ok()?,
        })
    }
}

/// CDN storage zone destination: `PUT {endpoint}/{zone}/{key}` with an
/// `AccessKey` header.
pub struct StorageZoneDestination {
    config: StorageZoneConfig,
    client: reqwest::Client,
}

impl StorageZoneDestination {
    pub fn new(config: StorageZoneConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl Destination for StorageZoneDestination {
    fn name(&self) -> &'static str {
        "storage_zone"
    }

    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> RemoteResult<String> {
        let url = format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.zone,
            key
        );

        let response = self
            .client
            .put(&url)
            .header("AccessKey", &self.config.access_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| RemoteError::Publish {
                destination: self.name().to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Publish {
                destination: self.name().to_string(),
                reason: format!("status {status}"),
            });
        }

        debug!(key, destination = self.name(), "Uploaded object");
        Ok(format!(
            "{}/{}",
            self.config.public_base.trim_end_matches('/'),
            key
        ))
    }
}

// ---------------------------------------------------------------------------
// BucketDestination — object bucket gateway
// ---------------------------------------------------------------------------

/// Object bucket gateway credentials.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Gateway endpoint.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Bearer token with write access.
    pub token: String,
    /// Public base URL objects are served from.
    pub public_base: String,
}

impl BucketConfig {
    /// Read the `PAGEPRESS_BUCKET_*` variable set.
    ///
    /// Returns `None` unless all four variables are present.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            endpoint: std::env::var("PAGEPRESS_BUCKET_ENDPOINT").ok()?,
            bucket: std::env::var("PAGEPRESS_BUCKET_NAME").ok()?,
            token: std::env::var("PAGEPRESS_BUCKET_TOKEN").ok()?,
            public_base: std::env::var("PAGEPRESS_BUCKET_PUBLIC_BASE").ok()?,
        })
    }
}

/// Bucket gateway destination: `PUT {endpoint}/{bucket}/{key}` with bearer
/// auth.
pub struct BucketDestination {
    config: BucketConfig,
    client: reqwest::Client,
}

impl BucketDestination {
    pub fn new(config: BucketConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl Destination for BucketDestination {
    fn name(&self) -> &'static str {
        "bucket"
    }

    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> RemoteResult<String> {
        let url = format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| RemoteError::Publish {
                destination: self.name().to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Publish {
                destination: self.name().to_string(),
                reason: format!("status {status}"),
            });
        }

        debug!(key, destination = self.name(), "Uploaded object");
        Ok(format!(
            "{}/{}",
            self.config.public_base.trim_end_matches('/'),
            key
        ))
    }
}
