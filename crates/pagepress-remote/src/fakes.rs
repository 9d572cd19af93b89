//! In-memory fakes for remote traits (testing only)
//!
//! `MemoryDestination` and `StaticGenerator` satisfy the trait contracts
//! without any network, and record enough to assert on upload counts,
//! generation counts, and failure paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use pagepress_core::ContentPayload;

use crate::destination::Destination;
use crate::error::{RemoteError, RemoteResult};
use crate::generate::ContentGenerator;

// ---------------------------------------------------------------------------
// MemoryDestination
// ---------------------------------------------------------------------------

/// In-memory destination that records every upload.
pub struct MemoryDestination {
    name: &'static str,
    public_base: String,
    fail: AtomicBool,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryDestination {
    pub fn new(name: &'static str, public_base: impl Into<String>) -> Self {
        Self {
            name,
            public_base: public_base.into(),
            fail: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Keys uploaded so far, in order.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Bytes most recently stored under `key`, if any.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str) -> RemoteResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Publish {
                destination: self.name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), bytes.to_vec()));
        Ok(format!("{}/{}", self.public_base.trim_end_matches('/'), key))
    }
}

// ---------------------------------------------------------------------------
// StaticGenerator
// ---------------------------------------------------------------------------

/// Generator serving canned payloads from memory.
///
/// Keywords without a canned payload get a synthesised one; keywords added
/// to the failure set fail single-item generation. Batch calls fail
/// wholesale while `fail_batch` is set.
#[derive(Default)]
pub struct StaticGenerator {
    payloads: Mutex<HashMap<String, ContentPayload>>,
    failing: Mutex<HashSet<String>>,
    fail_batch: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl StaticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a canned payload for a keyword.
    pub fn set_payload(&self, keyword: &str, payload: ContentPayload) {
        self.payloads
            .lock()
            .unwrap()
            .insert(keyword.to_string(), payload);
    }

    /// Make single-item generation fail for a keyword.
    pub fn fail_keyword(&self, keyword: &str) {
        self.failing.lock().unwrap().insert(keyword.to_string());
    }

    /// Make every batch call fail.
    pub fn fail_batch(&self, fail: bool) {
        self.fail_batch.store(fail, Ordering::SeqCst);
    }

    /// Keywords passed to `generate`, in call order.
    pub fn generate_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn synthesise(keyword: &str) -> ContentPayload {
        ContentPayload {
            title: format!("All About {keyword}"),
            description: format!("Everything worth knowing about {keyword}."),
            keywords: vec![keyword.to_string()],
            body_html: format!("<h2>{keyword}</h2>\n<p>Generated body.</p>"),
        }
    }
}

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn generate(&self, keyword: &str) -> RemoteResult<ContentPayload> {
        self.calls.lock().unwrap().push(keyword.to_string());

        if self.failing.lock().unwrap().contains(keyword) {
            return Err(RemoteError::Generation {
                keyword: keyword.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let canned = self.payloads.lock().unwrap().get(keyword).cloned();
        Ok(canned.unwrap_or_else(|| Self::synthesise(keyword)))
    }

    async fn generate_batch(
        &self,
        keywords: &[String],
        variations: usize,
    ) -> RemoteResult<BTreeMap<String, Vec<ContentPayload>>> {
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(RemoteError::BatchExhausted {
                attempts: 4,
                reason: "injected failure".to_string(),
            });
        }

        let mut map = BTreeMap::new();
        for keyword in keywords {
            let mut variants = Vec::with_capacity(variations);
            for n in 1..=variations {
                let mut payload = Self::synthesise(keyword);
                payload.title = format!("{} (take {n})", payload.title);
                variants.push(payload);
            }
            map.insert(keyword.clone(), variants);
        }
        Ok(map)
    }
}
