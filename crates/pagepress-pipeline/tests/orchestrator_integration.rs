//! Integration tests for the orchestrator with in-memory fakes.

use std::sync::Arc;

use pagepress_core::{ItemKind, JobItem};
use pagepress_pipeline::{Orchestrator, OrchestratorConfig, RunSummary};
use pagepress_remote::fakes::{MemoryDestination, StaticGenerator};
use pagepress_remote::Publisher;
use pagepress_state::fakes::MemoryCheckpoint;
use pagepress_state::{load_sitemap, CheckpointLedger};

struct Harness {
    generator: Arc<StaticGenerator>,
    primary: Arc<MemoryDestination>,
    secondary: Arc<MemoryDestination>,
    checkpoint: Arc<MemoryCheckpoint>,
    orchestrator: Orchestrator,
    sitemap_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(concurrency: usize) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let sitemap_path = dir.path().join("sitemap.xml");

    let generator = Arc::new(StaticGenerator::new());
    let primary = Arc::new(MemoryDestination::new("storage_zone", "https://cdn.example"));
    let secondary = Arc::new(MemoryDestination::new("bucket", "https://bucket.example"));
    let checkpoint = Arc::new(MemoryCheckpoint::new());

    let publisher = Arc::new(Publisher::new(vec![primary.clone(), secondary.clone()]));
    let mut config = OrchestratorConfig::new(&sitemap_path);
    config.concurrency = concurrency;
    config.base_url = "https://cdn.example".to_string();

    let orchestrator = Orchestrator::new(
        generator.clone(),
        publisher,
        None,
        checkpoint.clone(),
        config,
    );

    Harness {
        generator,
        primary,
        secondary,
        checkpoint,
        orchestrator,
        sitemap_path,
        _dir: dir,
    }
}

fn items(keys: &[&str]) -> Vec<JobItem> {
    keys.iter().map(|k| JobItem::new(*k, ItemKind::Primary)).collect()
}

/// Test: 3 keywords, concurrency 1, one destination always succeeding,
/// indexing disabled — the canonical end-to-end scenario.
#[tokio::test]
async fn test_end_to_end_three_keywords() {
    let h = harness(1);

    let summary: RunSummary = h
        .orchestrator
        .run(items(&["first topic", "second topic", "third topic"]))
        .await;

    assert_eq!(summary.generated, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failed_keys.is_empty());
    assert_eq!(summary.published.get("storage_zone"), Some(&3));

    // Three artifacts plus the sitemap itself were uploaded.
    let uploads = h.primary.uploads();
    assert_eq!(uploads.len(), 4);
    assert!(uploads.contains(&"articles/first-topic.html".to_string()));
    assert!(uploads.contains(&"sitemap.xml".to_string()));

    // The artifact embeds its canonical link and the generated title.
    let bytes = h
        .primary
        .object("articles/first-topic.html")
        .expect("artifact stored");
    let html = String::from_utf8(bytes).expect("utf8");
    assert!(html.contains("https://cdn.example/articles/first-topic.html"));
    assert!(html.contains("All About first topic"));

    // The sitemap holds exactly three unique entries.
    let entries = load_sitemap(&h.sitemap_path);
    assert_eq!(entries.len(), 3);
    assert!(entries
        .iter()
        .any(|e| e.loc == "https://cdn.example/articles/second-topic.html"));

    // Checkpoint: processed = the 3 keywords, failed = empty.
    let state = h.checkpoint.snapshot().await;
    assert_eq!(state.processed.len(), 3);
    assert!(state.processed.contains("first topic"));
    assert!(state.failed.is_empty());
}

/// Test: a run split into two invocations with a persisted checkpoint
/// generates the same set as one run, and no keyword twice.
#[tokio::test]
async fn test_idempotent_resume() {
    let h = harness(2);

    let first = h.orchestrator.run(items(&["alpha", "beta"])).await;
    assert_eq!(first.generated, 2);

    // Second invocation covers the full keyword set.
    let second = h
        .orchestrator
        .run(items(&["alpha", "beta", "gamma"]))
        .await;
    assert_eq!(second.skipped, 2);
    assert_eq!(second.generated, 1);

    // Each keyword hit the generator exactly once across both runs.
    let mut calls = h.generator.generate_calls();
    calls.sort();
    assert_eq!(calls, vec!["alpha", "beta", "gamma"]);

    let state = h.checkpoint.snapshot().await;
    assert_eq!(state.processed.len(), 3);
}

/// Test: failed keywords are checkpointed and not retried on re-run.
#[tokio::test]
async fn test_failed_items_are_not_retried() {
    let h = harness(1);
    h.generator.fail_keyword("broken");

    let first = h.orchestrator.run(items(&["broken", "fine"])).await;
    assert_eq!(first.generated, 1);
    assert_eq!(first.failed, 1);
    assert_eq!(first.failed_keys, vec!["broken".to_string()]);

    let second = h.orchestrator.run(items(&["broken", "fine"])).await;
    assert_eq!(second.skipped, 2);
    assert_eq!(second.generated, 0);

    // "broken" was attempted exactly once.
    let calls = h.generator.generate_calls();
    assert_eq!(calls.iter().filter(|k| *k == "broken").count(), 1);
}

/// Test: primary failing falls the canonical URL back to the secondary.
#[tokio::test]
async fn test_canonical_falls_back_to_secondary() {
    let h = harness(1);
    h.primary.fail_uploads(true);

    let summary = h.orchestrator.run(items(&["resilient topic"])).await;
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.published.get("storage_zone"), None);
    assert_eq!(summary.published.get("bucket"), Some(&1));

    let entries = load_sitemap(&h.sitemap_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].loc,
        "https://bucket.example/articles/resilient-topic.html"
    );
}

/// Test: all destinations failing means no sitemap entry, and the item is
/// marked failed while still counting as generated.
#[tokio::test]
async fn test_total_publish_failure() {
    let h = harness(1);
    h.primary.fail_uploads(true);
    h.secondary.fail_uploads(true);

    let summary = h.orchestrator.run(items(&["doomed topic"])).await;
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_keys, vec!["doomed topic".to_string()]);

    // No canonical URL: no sitemap was written at all.
    assert!(!h.sitemap_path.exists());

    let state = h.checkpoint.snapshot().await;
    assert!(state.failed.contains("doomed topic"));
    assert!(state.processed.is_empty());
}

/// Test: successive runs merge into the sitemap instead of replacing it.
#[tokio::test]
async fn test_sitemap_accumulates_across_runs() {
    let h = harness(1);

    h.orchestrator.run(items(&["one"])).await;
    h.orchestrator.run(items(&["two"])).await;

    let entries = load_sitemap(&h.sitemap_path);
    assert_eq!(entries.len(), 2);
    let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
    assert_eq!(
        locs,
        vec![
            "https://cdn.example/articles/one.html",
            "https://cdn.example/articles/two.html",
        ]
    );
}

/// Test: checkpoint persist failures degrade resumability, never the run.
#[tokio::test]
async fn test_persist_failure_is_not_fatal() {
    let h = harness(1);
    h.checkpoint.fail_persist(true);

    let summary = h.orchestrator.run(items(&["sturdy topic"])).await;
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.failed, 0);
    assert!(h.checkpoint.persist_calls() > 0);
}

/// Test: batch variation mode publishes every variation and checkpoints
/// the keyword once.
#[tokio::test]
async fn test_batch_mode_publishes_variations() {
    let h = harness(2);

    let summary = h
        .orchestrator
        .run_batch(items(&["topic a", "topic b"]), 2, 10)
        .await;

    assert_eq!(summary.generated, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.published.get("storage_zone"), Some(&4));

    let uploads = h.primary.uploads();
    assert!(uploads.contains(&"articles/topic-a-v1.html".to_string()));
    assert!(uploads.contains(&"articles/topic-a-v2.html".to_string()));
    assert!(uploads.contains(&"articles/topic-b-v1.html".to_string()));

    let entries = load_sitemap(&h.sitemap_path);
    assert_eq!(entries.len(), 4);

    let state = h.checkpoint.snapshot().await;
    assert_eq!(state.processed.len(), 2);
}

/// Test: a batch that exhausts retries marks the entire chunk failed.
#[tokio::test]
async fn test_batch_failure_marks_all_keywords() {
    let h = harness(1);
    h.generator.fail_batch(true);

    let summary = h
        .orchestrator
        .run_batch(items(&["a", "b", "c"]), 3, 2)
        .await;

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.failed, 3);
    assert!(h.primary.uploads().is_empty());

    let state = h.checkpoint.snapshot().await;
    assert_eq!(state.failed.len(), 3);
    assert!(state.processed.is_empty());
}
