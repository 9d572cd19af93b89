//! Batch run orchestration.
//!
//! The orchestrator owns the two shared mutable resources of a run — the
//! checkpoint and the sitemap — and writes both serially. Items flow
//! through the bounded pool concurrently; the sitemap merge happens exactly
//! once, after all per-item work has settled.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pagepress_core::{
    canonical_path, merge_template, slugify, Artifact, ContentPayload, JobItem, PublishResult,
    SitemapEntry,
};
use pagepress_remote::{ChangeKind, ContentGenerator, IndexingNotifier, Publisher};
use pagepress_state::{load_sitemap, merge_entries, save_sitemap, CheckpointLedger};

use crate::pool::run_bounded;

/// Run-level knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Worker pool size, clamped to `[1, 100]` by the scheduler.
    pub concurrency: usize,

    /// Site name substituted into the document template.
    pub site_name: String,

    /// Base URL embedded as each artifact's canonical link.
    pub base_url: String,

    /// Document template contents.
    pub template: String,

    /// Where the merged sitemap is persisted. The checkpoint side-file
    /// derives from this path.
    pub sitemap_path: PathBuf,
}

impl OrchestratorConfig {
    /// Config with defaults for everything but the sitemap path.
    pub fn new(sitemap_path: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: 5,
            site_name: "Pagepress".to_string(),
            base_url: "https://example.org".to_string(),
            template: pagepress_core::DEFAULT_TEMPLATE.to_string(),
            sitemap_path: sitemap_path.into(),
        }
    }
}

/// Aggregate counters for one invocation. Not persisted beyond the summary
/// output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Items whose content was generated (publish failures still count).
    pub generated: usize,

    /// Successful uploads per destination name.
    pub published: BTreeMap<String, usize>,

    /// Successful indexing notifications.
    pub indexed: usize,

    /// Items marked failed this run.
    pub failed: usize,

    /// Items skipped because the checkpoint already holds them.
    pub skipped: usize,

    /// The literal keys that failed, for targeted re-runs.
    pub failed_keys: Vec<String>,
}

/// Resolved result of one item's pipeline.
struct ItemOutcome {
    key: String,
    generated: bool,
    failed: bool,
    indexed: usize,
    results: Vec<PublishResult>,
}

impl ItemOutcome {
    fn generation_failed(key: String) -> Self {
        Self {
            key,
            generated: false,
            failed: true,
            indexed: 0,
            results: Vec::new(),
        }
    }
}

/// Wires generation, publishing, notification, and persistence into a
/// resumable run. All collaborator handles are constructed by the caller
/// and passed in explicitly.
pub struct Orchestrator {
    generator: Arc<dyn ContentGenerator>,
    publisher: Arc<Publisher>,
    notifier: Option<Arc<IndexingNotifier>>,
    checkpoint: Arc<dyn CheckpointLedger>,
    config: OrchestratorConfig,
    // Checkpoint writes are serialised even though items resolve
    // concurrently; each persist is a full snapshot.
    persist_gate: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        publisher: Arc<Publisher>,
        notifier: Option<Arc<IndexingNotifier>>,
        checkpoint: Arc<dyn CheckpointLedger>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            generator,
            publisher,
            notifier,
            checkpoint,
            config,
            persist_gate: Mutex::new(()),
        }
    }

    /// Run the per-keyword pipeline over every pending item.
    pub async fn run(&self, items: Vec<JobItem>) -> RunSummary {
        let mut summary = RunSummary::default();
        let pending = self.filter_pending(items, &mut summary).await;

        info!(
            event = "run.started",
            pending = pending.len(),
            skipped = summary.skipped,
            concurrency = self.config.concurrency,
            "Starting publishing run"
        );

        let entries: Arc<Mutex<Vec<SitemapEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let outcomes = run_bounded(pending, self.config.concurrency, |item| {
            let entries = Arc::clone(&entries);
            async move { self.process_item(item, entries).await }
        })
        .await;

        for outcome in outcomes {
            absorb(&mut summary, outcome);
        }

        let incoming = std::mem::take(&mut *entries.lock().await);
        self.finalize_sitemap(incoming).await;

        info!(
            event = "run.finished",
            generated = summary.generated,
            failed = summary.failed,
            skipped = summary.skipped,
            indexed = summary.indexed,
            "Publishing run complete"
        );
        summary
    }

    /// Pre-generate `variations` artifacts per keyword, `batch_size`
    /// keywords per generation call.
    ///
    /// A batch that exhausts its retries marks every keyword in the chunk
    /// failed; partial credit exists only inside a structurally valid
    /// response.
    pub async fn run_batch(
        &self,
        items: Vec<JobItem>,
        variations: usize,
        batch_size: usize,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let pending = self.filter_pending(items, &mut summary).await;

        let chunks: Vec<Vec<String>> = pending
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.iter().map(|item| item.key.clone()).collect())
            .collect();

        info!(
            event = "run.started",
            pending = pending.len(),
            skipped = summary.skipped,
            batches = chunks.len(),
            variations,
            "Starting variation pre-generation run"
        );

        let entries: Arc<Mutex<Vec<SitemapEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let outcomes = run_bounded(chunks, self.config.concurrency, |chunk| {
            let entries = Arc::clone(&entries);
            async move { self.process_chunk(chunk, variations, entries).await }
        })
        .await;

        for outcome in outcomes.into_iter().flatten() {
            absorb(&mut summary, outcome);
        }

        let incoming = std::mem::take(&mut *entries.lock().await);
        self.finalize_sitemap(incoming).await;

        info!(
            event = "run.finished",
            generated = summary.generated,
            failed = summary.failed,
            skipped = summary.skipped,
            "Variation pre-generation complete"
        );
        summary
    }

    async fn filter_pending(
        &self,
        items: Vec<JobItem>,
        summary: &mut RunSummary,
    ) -> Vec<JobItem> {
        let mut pending = Vec::with_capacity(items.len());
        for item in items {
            if self.checkpoint.is_done(&item.key).await {
                debug!(key = %item.key, "Skipping checkpointed item");
                summary.skipped += 1;
            } else {
                pending.push(item);
            }
        }
        pending
    }

    /// The per-item pipeline: generate, build, publish, notify, track.
    async fn process_item(
        &self,
        mut item: JobItem,
        entries: Arc<Mutex<Vec<SitemapEntry>>>,
    ) -> ItemOutcome {
        let keyword = item.key.clone();

        let payload = match self.generator.generate(&keyword).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(event = "item.failed", key = %keyword, error = %err, "Generation failed");
                item.mark_failed();
                self.checkpoint.mark_failed(&keyword).await;
                self.persist_checkpoint().await;
                return ItemOutcome::generation_failed(keyword);
            }
        };

        let slug = slugify(&keyword);
        let outcome = self
            .publish_payload(&keyword, &slug, &payload, &entries)
            .await;

        if outcome.failed {
            item.mark_failed();
            self.checkpoint.mark_failed(&keyword).await;
        } else {
            item.mark_succeeded();
            self.checkpoint.mark_processed(&keyword).await;
        }
        debug!(key = %item.key, status = ?item.status, "Item resolved");
        self.persist_checkpoint().await;

        outcome
    }

    /// The per-batch pipeline: one generation call for the whole chunk,
    /// then the publish/notify/track tail per keyword and variation.
    async fn process_chunk(
        &self,
        chunk: Vec<String>,
        variations: usize,
        entries: Arc<Mutex<Vec<SitemapEntry>>>,
    ) -> Vec<ItemOutcome> {
        let map = match self.generator.generate_batch(&chunk, variations).await {
            Ok(map) => map,
            Err(err) => {
                warn!(
                    event = "batch.failed",
                    size = chunk.len(),
                    error = %err,
                    "Batch exhausted retries; marking every keyword failed"
                );
                let mut outcomes = Vec::with_capacity(chunk.len());
                for keyword in chunk {
                    self.checkpoint.mark_failed(&keyword).await;
                    outcomes.push(ItemOutcome::generation_failed(keyword));
                }
                self.persist_checkpoint().await;
                return outcomes;
            }
        };

        let mut outcomes = Vec::with_capacity(chunk.len());
        for keyword in chunk {
            let variants = map.get(&keyword).cloned().unwrap_or_default();
            let slug = slugify(&keyword);

            let mut merged = ItemOutcome {
                key: keyword.clone(),
                generated: !variants.is_empty(),
                failed: true,
                indexed: 0,
                results: Vec::new(),
            };

            for (n, payload) in variants.iter().enumerate() {
                let variant_slug = format!("{}-v{}", slug, n + 1);
                let outcome = self
                    .publish_payload(&keyword, &variant_slug, payload, &entries)
                    .await;
                merged.indexed += outcome.indexed;
                merged.results.extend(outcome.results);
                if !outcome.failed {
                    // The keyword succeeds when any variation landed.
                    merged.failed = false;
                }
            }

            if merged.failed {
                self.checkpoint.mark_failed(&keyword).await;
            } else {
                self.checkpoint.mark_processed(&keyword).await;
            }
            outcomes.push(merged);
        }

        // One full-snapshot persist per batch.
        self.persist_checkpoint().await;
        outcomes
    }

    /// Shared pipeline tail: template merge, multi-destination publish,
    /// best-effort notification, sitemap entry accumulation.
    async fn publish_payload(
        &self,
        keyword: &str,
        slug: &str,
        payload: &ContentPayload,
        entries: &Mutex<Vec<SitemapEntry>>,
    ) -> ItemOutcome {
        let embedded_canonical = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            canonical_path(slug)
        );
        let html = merge_template(
            &self.config.template,
            payload,
            &embedded_canonical,
            &self.config.site_name,
            chrono::Utc::now().date_naive(),
        );
        let artifact = Artifact::new(slug, html);
        debug!(key = keyword, artifact = %artifact.id, object = %artifact.object_key(), "Built artifact");

        let results = self
            .publisher
            .publish(&artifact.object_key(), artifact.html.as_bytes(), "text/html")
            .await;
        let canonical = Publisher::canonical_url(&results).map(str::to_string);

        let mut indexed = 0;
        match &canonical {
            Some(url) => {
                if let Some(notifier) = &self.notifier {
                    // Best-effort: the notifier logs its own failures.
                    if notifier.notify(url, ChangeKind::Updated).await.is_ok() {
                        indexed = 1;
                    }
                }
                entries.lock().await.push(SitemapEntry::today(url.clone()));
            }
            None => {
                warn!(event = "item.failed", key = keyword, "No destination accepted the artifact");
            }
        }

        ItemOutcome {
            key: keyword.to_string(),
            generated: true,
            failed: canonical.is_none(),
            indexed,
            results,
        }
    }

    /// Merge and persist the sitemap exactly once, then publish the file
    /// itself through the same priority/fallback rule as artifacts.
    async fn finalize_sitemap(&self, incoming: Vec<SitemapEntry>) {
        if incoming.is_empty() {
            debug!("No new sitemap entries this run");
            return;
        }

        let existing = load_sitemap(&self.config.sitemap_path);
        let merged = merge_entries(existing, incoming);

        if let Err(err) = save_sitemap(&self.config.sitemap_path, &merged) {
            warn!(event = "sitemap.persist_failed", error = %err, "Sitemap persist failed");
            return;
        }
        info!(event = "sitemap.saved", entries = merged.len(), path = %self.config.sitemap_path.display());

        match std::fs::read(&self.config.sitemap_path) {
            Ok(bytes) => {
                let results = self
                    .publisher
                    .publish("sitemap.xml", &bytes, "application/xml")
                    .await;
                if Publisher::canonical_url(&results).is_none() {
                    warn!(event = "sitemap.publish_failed", "No destination accepted the sitemap");
                }
            }
            Err(err) => {
                warn!(event = "sitemap.publish_failed", error = %err, "Could not reread sitemap");
            }
        }
    }

    async fn persist_checkpoint(&self) {
        let _gate = self.persist_gate.lock().await;
        if let Err(err) = self.checkpoint.persist().await {
            // Degrades resumability for this run, not correctness.
            warn!(event = "checkpoint.persist_failed", error = %err, "Checkpoint persist failed");
        }
    }
}

fn absorb(summary: &mut RunSummary, outcome: ItemOutcome) {
    if outcome.generated {
        summary.generated += 1;
    }
    for result in &outcome.results {
        if result.ok {
            *summary.published.entry(result.destination.clone()).or_default() += 1;
        }
    }
    summary.indexed += outcome.indexed;
    if outcome.failed {
        summary.failed += 1;
        summary.failed_keys.push(outcome.key);
    }
}
