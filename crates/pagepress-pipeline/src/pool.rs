//! Bounded-concurrency scheduling.
//!
//! A sliding window, not fixed-size batching: the pool starts items up to
//! the bound, then replaces each completion one-for-one, so a slow item
//! never stalls the rest of its chunk. Completion order is unspecified.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

/// Lower bound on the worker limit.
pub const MIN_WORKERS: usize = 1;

/// Upper bound on the worker limit.
pub const MAX_WORKERS: usize = 100;

/// Drive every item through `f` with at most `limit` futures in flight.
///
/// `limit` is clamped to `[MIN_WORKERS, MAX_WORKERS]`; a limit of 1
/// degenerates to strictly sequential processing in submission order.
/// There is no cancellation — the pool runs to exhaustion of the item
/// list. Outputs are collected in completion order.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<Fut::Output>
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future,
{
    let limit = limit.clamp(MIN_WORKERS, MAX_WORKERS);
    let total = items.len();
    debug!(total, limit, "Scheduling items");

    let mut queue = items.into_iter();
    let mut active = FuturesUnordered::new();
    let mut outputs = Vec::with_capacity(total);

    for item in queue.by_ref().take(limit) {
        active.push(f(item));
    }

    while let Some(output) = active.next().await {
        outputs.push(output);
        if let Some(item) = queue.next() {
            active.push(f(item));
        }
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..20).collect();
        let outputs = run_bounded(items, 4, |n| {
            let current = current.clone();
            let peak = peak.clone();
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                n * 2
            }
        })
        .await;

        assert_eq!(outputs.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 4, "window exceeded the bound");
        assert!(peak.load(Ordering::SeqCst) > 1, "pool never overlapped work");
    }

    #[tokio::test]
    async fn test_limit_one_is_sequential() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let items: Vec<usize> = (0..6).collect();
        run_bounded(items, 1, |n| {
            let order = order.clone();
            async move {
                // Out-of-order sleeps would reorder completions if anything
                // overlapped.
                tokio::time::sleep(Duration::from_millis((6 - n) as u64)).await;
                order.lock().unwrap().push(n);
            }
        })
        .await;

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        // A zero limit still makes progress (clamped up to 1)...
        let outputs = run_bounded(vec![1, 2, 3], 0, |n| async move { n }).await;
        assert_eq!(outputs.len(), 3);

        // ...and an absurd limit is accepted (clamped down to 100).
        let items: Vec<usize> = (0..150).collect();
        let outputs = run_bounded(items, 10_000, |n| async move { n }).await;
        assert_eq!(outputs.len(), 150);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outputs = run_bounded(Vec::<u8>::new(), 5, |n| async move { n }).await;
        assert!(outputs.is_empty());
    }
}
