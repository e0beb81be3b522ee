//! Bulk Operations
//!
//! Bounded-concurrency fan-out of independent per-item requests. Every item
//! runs to completion; failures are collected per item, never aborting the
//! batch.

use futures_util::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;

use crate::api::{ApiError, ApiResult};

/// Default number of requests in flight
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Outcome for one item of a batch
#[derive(Debug)]
pub struct BulkItem<K, T> {
    pub key: K,
    pub outcome: Result<T, ApiError>,
}

/// Outcomes of a batch, in input order
#[derive(Debug)]
pub struct BulkReport<K, T> {
    pub items: Vec<BulkItem<K, T>>,
}

impl<K, T> BulkReport<K, T> {
    pub fn succeeded(&self) -> impl Iterator<Item = (&K, &T)> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref().ok().map(|v| (&item.key, v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&K, &ApiError)> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref().err().map(|e| (&item.key, e)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Human-readable failure lines (`key: detail`)
    pub fn error_lines(&self) -> Vec<String>
    where
        K: Display,
    {
        self.failed()
            .map(|(key, err)| format!("{}: {}", key, err.detail()))
            .collect()
    }
}

/// Run `op` for every key with at most `concurrency` calls in flight
pub async fn fan_out<K, T, F, Fut>(keys: Vec<K>, concurrency: usize, op: F) -> BulkReport<K, T>
where
    K: Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let total = keys.len();
    let op = &op;

    let mut results: Vec<(usize, BulkItem<K, T>)> = stream::iter(keys.into_iter().enumerate())
        .map(|(index, key)| async move {
            let outcome = op(key.clone()).await;
            if let Err(e) = &outcome {
                tracing::warn!(item = %key, error = %e, "Bulk item failed");
            }
            (index, BulkItem { key, outcome })
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    let report = BulkReport {
        items: results.into_iter().map(|(_, item)| item).collect(),
    };

    tracing::info!(
        total,
        succeeded = report.success_count(),
        failed = report.failure_count(),
        "Bulk operation finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_and_error_aggregation() {
        let report = fan_out(vec![1u32, 2, 3, 4, 5], 2, |n| async move {
            // Later items finish first
            tokio::time::sleep(Duration::from_millis(u64::from(10 - n))).await;
            if n % 2 == 0 {
                Err(ApiError::Validation(format!("even {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        let keys: Vec<u32> = report.items.iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.success_count(), 3);
        assert_eq!(report.failure_count(), 2);
        assert_eq!(
            report.succeeded().map(|(_, v)| *v).collect::<Vec<_>>(),
            vec![10, 30, 50]
        );
        assert_eq!(report.error_lines()[0], "2: Validation error: even 2");
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = fan_out((0..20).collect::<Vec<u32>>(), 6, |_| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ApiError>(())
            }
        })
        .await;

        assert_eq!(report.success_count(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = fan_out(Vec::<String>::new(), 0, |_| async { Ok::<_, ApiError>(()) }).await;
        assert!(report.is_empty());
    }
}
