//! Checkpointed run state.
//!
//! The checkpoint records which keywords have already been processed or
//! permanently failed, keyed to a run by a side file derived from the
//! sitemap output path. Re-running against the same source and checkpoint
//! processes each pending keyword at most once across any number of
//! restarts; callers consult [`CheckpointLedger::is_done`] before starting
//! work on a key.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};

/// Full checkpoint contents: both sets are terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Keywords that completed their pipeline.
    pub processed: BTreeSet<String>,

    /// Keywords that failed permanently. Retrying them requires clearing
    /// this set by hand; automatic retry of broken inputs is intentional
    /// non-behavior.
    pub failed: BTreeSet<String>,
}

impl CheckpointState {
    /// Whether a key is in either terminal set.
    pub fn is_done(&self, key: &str) -> bool {
        self.processed.contains(key) || self.failed.contains(key)
    }
}

/// Key-value view of the checkpoint.
///
/// Guarantees:
/// - `is_done` reflects every prior `mark_*` call in this process plus
///   whatever the backing store held at load time.
/// - `persist` writes a full, self-consistent snapshot; interrupting it
///   leaves the previous snapshot intact.
/// - Mutations never move a key out of a terminal set.
#[async_trait]
pub trait CheckpointLedger: Send + Sync {
    /// True when the key has already been processed or permanently failed.
    async fn is_done(&self, key: &str) -> bool;

    /// Record a key as successfully processed.
    async fn mark_processed(&self, key: &str);

    /// Record a key as permanently failed.
    async fn mark_failed(&self, key: &str);

    /// Write the full state to the backing store atomically.
    async fn persist(&self) -> StateResult<()>;

    /// Copy of the current in-memory state.
    async fn snapshot(&self) -> CheckpointState;
}

/// Derive the checkpoint side-file path from an output target.
///
/// `sitemap.xml` maps to `sitemap.xml.checkpoint.json`, keeping the
/// checkpoint next to the artifact it guards.
pub fn checkpoint_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".checkpoint.json");
    PathBuf::from(name)
}

/// File-backed checkpoint: a JSON document `{"processed": [...], "failed": [...]}`.
#[derive(Debug)]
pub struct FileCheckpoint {
    path: PathBuf,
    state: Mutex<CheckpointState>,
}

impl FileCheckpoint {
    /// Load prior state from `path`.
    ///
    /// A missing or unreadable file yields empty sets — resuming from
    /// nothing is never fatal.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<CheckpointState>(&contents) {
                Ok(state) => {
                    debug!(
                        path = %path.display(),
                        processed = state.processed.len(),
                        failed = state.failed.len(),
                        "Loaded checkpoint"
                    );
                    state
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Checkpoint unreadable, starting empty");
                    CheckpointState::default()
                }
            },
            Err(_) => CheckpointState::default(),
        };

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, state: &CheckpointState) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(state)?;

        // Entire-file overwrite: stage in the same directory, then rename so
        // a crash mid-write leaves the previous snapshot valid.
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path).map_err(|err| StateError::Persist {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointLedger for FileCheckpoint {
    async fn is_done(&self, key: &str) -> bool {
        self.state.lock().unwrap().is_done(key)
    }

    async fn mark_processed(&self, key: &str) {
        self.state.lock().unwrap().processed.insert(key.to_string());
    }

    async fn mark_failed(&self, key: &str) {
        self.state.lock().unwrap().failed.insert(key.to_string());
    }

    async fn persist(&self) -> StateResult<()> {
        let state = self.state.lock().unwrap().clone();
        self.write_atomic(&state)
    }

    async fn snapshot(&self) -> CheckpointState {
        self.state.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_path_derivation() {
        assert_eq!(
            checkpoint_path_for(Path::new("out/sitemap.xml")),
            PathBuf::from("out/sitemap.xml.checkpoint.json")
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = FileCheckpoint::load(dir.path().join("absent.checkpoint.json"));

        let state = ledger.snapshot().await;
        assert!(state.processed.is_empty());
        assert!(state.failed.is_empty());
        assert!(!ledger.is_done("anything").await);
    }

    #[tokio::test]
    async fn test_persist_and_reload_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sitemap.xml.checkpoint.json");

        let ledger = FileCheckpoint::load(&path);
        ledger.mark_processed("alpha").await;
        ledger.mark_failed("beta").await;
        ledger.persist().await.expect("persist failed");

        let reloaded = FileCheckpoint::load(&path);
        assert!(reloaded.is_done("alpha").await);
        assert!(reloaded.is_done("beta").await);
        assert!(!reloaded.is_done("gamma").await);

        let state = reloaded.snapshot().await;
        assert!(state.processed.contains("alpha"));
        assert!(state.failed.contains("beta"));
    }

    #[tokio::test]
    async fn test_corrupt_file_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.checkpoint.json");
        std::fs::write(&path, b"{not json").expect("write fixture");

        let ledger = FileCheckpoint::load(&path);
        assert!(!ledger.is_done("anything").await);

        // Persisting over the corrupt file recovers it.
        ledger.mark_processed("alpha").await;
        ledger.persist().await.expect("persist failed");
        let reloaded = FileCheckpoint::load(&path);
        assert!(reloaded.is_done("alpha").await);
    }

    #[tokio::test]
    async fn test_persist_is_full_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snap.checkpoint.json");

        let ledger = FileCheckpoint::load(&path);
        ledger.mark_processed("one").await;
        ledger.persist().await.expect("persist failed");
        ledger.mark_processed("two").await;
        ledger.persist().await.expect("persist failed");

        let contents = std::fs::read_to_string(&path).expect("read");
        let state: CheckpointState = serde_json::from_str(&contents).expect("parse");
        assert_eq!(state.processed.len(), 2);
    }
}
