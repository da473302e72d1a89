//! Bounded-parallelism batch executor with ordered results
//!
//! Given an ordered sequence of N items and an async item function, the
//! scheduler splits the items into W contiguous, near-equal batches and runs
//! each batch on its own task. Results come back in input order regardless of
//! completion order, and a failing item leaves a structured failure value in
//! its slot instead of aborting siblings.
//!
//! There is no cancellation and no timeout at this layer; a call blocks until
//! every batch has completed. Timeouts belong to the provider boundary.

use std::future::Future;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::constants::scheduler;

/// Structured failure captured in an output slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    /// Input-order index of the failed item
    pub index: usize,
    /// Worker (batch) that processed the item
    pub worker_id: usize,
    /// Rendered error message
    pub message: String,
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "item {} failed on worker {}: {}",
            self.index, self.worker_id, self.message
        )
    }
}

/// Per-slot outcome of a scheduled run
pub type SlotResult<R> = std::result::Result<R, WorkerFailure>;

/// Number of workers used when the caller does not specify one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(scheduler::FALLBACK_WORKER_COUNT)
}

/// Compute contiguous batch sizes for `n` items over `w` workers
///
/// The effective worker count is `min(w, n)`; every batch gets `n / w` items
/// and the first `n % w` batches get one extra, so sizes differ by at most 1.
/// `n = 0` yields no batches.
pub fn partition_sizes(n: usize, w: usize) -> Vec<usize> {
    if n == 0 || w == 0 {
        return Vec::new();
    }
    let workers = w.min(n);
    let base = n / workers;
    let extra = n % workers;
    (0..workers)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Run `func` over `items` with bounded parallelism, preserving input order
///
/// `worker_count` defaults to the available parallel execution units. Each
/// batch is processed sequentially by exactly one worker; batches execute
/// concurrently. The item function receives the item and its input-order
/// index. A failing item yields `Err(WorkerFailure)` in its slot; all other
/// slots are unaffected.
pub async fn run_ordered<T, R, E, F, Fut>(
    items: Vec<T>,
    worker_count: Option<usize>,
    func: F,
) -> Vec<SlotResult<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(T, usize) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let sizes = partition_sizes(total, worker_count.unwrap_or_else(default_worker_count));
    debug!(
        total,
        workers = sizes.len(),
        "scheduling ordered batch run"
    );

    let mut items = items.into_iter();
    let mut handles = Vec::with_capacity(sizes.len());
    let mut start = 0usize;

    for (worker_id, size) in sizes.into_iter().enumerate() {
        let batch: Vec<T> = items.by_ref().take(size).collect();
        let func = func.clone();
        let batch_start = start;
        start += size;

        handles.push(tokio::spawn(async move {
            let mut slots: Vec<SlotResult<R>> = Vec::with_capacity(batch.len());
            for (offset, item) in batch.into_iter().enumerate() {
                let index = batch_start + offset;
                match func(item, index).await {
                    Ok(result) => slots.push(Ok(result)),
                    Err(e) => {
                        warn!(index, worker_id, error = %e, "work item failed");
                        slots.push(Err(WorkerFailure {
                            index,
                            worker_id,
                            message: e.to_string(),
                        }));
                    }
                }
            }
            (batch_start, worker_id, slots)
        }));
    }

    let mut results: Vec<Option<SlotResult<R>>> = (0..total).map(|_| None).collect();
    for (handle_id, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok((batch_start, _, slots)) => {
                for (offset, slot) in slots.into_iter().enumerate() {
                    results[batch_start + offset] = Some(slot);
                }
            }
            // A panicked worker loses its whole batch; slots are filled below.
            Err(e) => warn!(worker_id = handle_id, error = %e, "worker task panicked"),
        }
    }

    results
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or(Err(WorkerFailure {
                index,
                worker_id: 0,
                message: "worker task panicked".to_string(),
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;

    #[test]
    fn test_partition_balance() {
        for n in 0..40usize {
            for w in 1..12usize {
                let sizes = partition_sizes(n, w);
                assert_eq!(sizes.iter().sum::<usize>(), n, "n={n} w={w}");
                if n > 0 {
                    assert_eq!(sizes.len(), w.min(n));
                    let max = sizes.iter().max().unwrap();
                    let min = sizes.iter().min().unwrap();
                    assert!(max - min <= 1, "n={n} w={w} sizes={sizes:?}");
                }
            }
        }
    }

    #[test]
    fn test_partition_first_batches_take_extra() {
        assert_eq!(partition_sizes(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(partition_sizes(3, 8), vec![1, 1, 1]);
        assert_eq!(partition_sizes(0, 4), Vec::<usize>::new());
    }

    #[tokio::test]
    async fn test_order_preserved_regardless_of_completion_order() {
        // Earlier items sleep longer, so later items finish first.
        let items: Vec<u64> = (0..16).collect();
        let results = run_ordered(items, Some(4), |item, _index| async move {
            tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(item))).await;
            Ok::<u64, Infallible>(item * 10)
        })
        .await;

        assert_eq!(results.len(), 16);
        for (i, slot) in results.iter().enumerate() {
            assert_eq!(*slot.as_ref().unwrap(), i as u64 * 10);
        }
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let items: Vec<usize> = (0..9).collect();
        for k in 0..9usize {
            let results = run_ordered(items.clone(), Some(3), move |item, _| async move {
                if item == k {
                    Err(format!("boom {item}"))
                } else {
                    Ok(item)
                }
            })
            .await;

            for (i, slot) in results.iter().enumerate() {
                if i == k {
                    let failure = slot.as_ref().unwrap_err();
                    assert_eq!(failure.index, k);
                    assert!(failure.message.contains("boom"));
                } else {
                    assert_eq!(*slot.as_ref().unwrap(), i);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_more_workers_than_items() {
        let results = run_ordered(vec![1, 2], Some(16), |item, _| async move {
            Ok::<i32, Infallible>(item + 1)
        })
        .await;
        assert_eq!(results.len(), 2);
        assert_eq!(*results[0].as_ref().unwrap(), 2);
        assert_eq!(*results[1].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_spawns_nothing() {
        let results = run_ordered(Vec::<i32>::new(), Some(4), |item, _| async move {
            Ok::<i32, Infallible>(item)
        })
        .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_default_worker_count_is_nonzero() {
        assert!(default_worker_count() >= 1);
    }
}
