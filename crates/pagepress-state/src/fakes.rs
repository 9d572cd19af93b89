//! In-memory fakes for persistence traits (testing only)
//!
//! `MemoryCheckpoint` satisfies the [`CheckpointLedger`] contract without
//! touching the filesystem, and can inject persist failures to exercise the
//! non-fatal degraded-resumability path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::checkpoint::{CheckpointLedger, CheckpointState};
use crate::error::{StateError, StateResult};

/// In-memory checkpoint ledger backed by a `Mutex<CheckpointState>`.
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    state: Mutex<CheckpointState>,
    fail_persist: AtomicBool,
    persist_calls: AtomicUsize,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-existing state, as if loaded from disk.
    pub fn with_state(state: CheckpointState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Make every subsequent `persist` call fail.
    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// Number of `persist` calls observed (including failed ones).
    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointLedger for MemoryCheckpoint {
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
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StateError::Persist {
                path: "<memory>".to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn snapshot(&self) -> CheckpointState {
        self.state.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_checkpoint_marks_and_contains() {
        let ledger = MemoryCheckpoint::new();
        assert!(!ledger.is_done("a").await);

        ledger.mark_processed("a").await;
        ledger.mark_failed("b").await;

        assert!(ledger.is_done("a").await);
        assert!(ledger.is_done("b").await);
        assert!(!ledger.is_done("c").await);
    }

    #[tokio::test]
    async fn test_injected_persist_failure() {
        let ledger = MemoryCheckpoint::new();
        ledger.persist().await.expect("persist should succeed");

        ledger.fail_persist(true);
        assert!(ledger.persist().await.is_err());
        assert_eq!(ledger.persist_calls(), 2);
    }
}
