//! Batch fetching with per-key deduplication and bounded parallelism.

use std::collections::HashMap;
use std::future::Future;

use futures::stream::{self, StreamExt};
use log::debug;

/// Fans a list of keys out to a fetch function.
///
/// Identical keys are fetched once and the outcome is copied to every
/// position that asked for it. At most `workers` distinct keys are in
/// flight at a time. Each position carries its own `Result`, so one bad key
/// never fails the batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchAggregator {
    workers: usize,
}

impl BatchAggregator {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Resolve `keys` in order. The output has one entry per input key.
    pub async fn fetch_batch<V, E, F, Fut>(&self, keys: &[String], fetch: F) -> Vec<Result<V, E>>
    where
        V: Clone,
        E: Clone,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut unique: Vec<String> = Vec::new();
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        for key in keys {
            slot_of.entry(key.as_str()).or_insert_with(|| {
                unique.push(key.clone());
                unique.len() - 1
            });
        }

        debug!(
            "Batch: {} keys, {} unique, {} workers",
            keys.len(),
            unique.len(),
            self.workers
        );

        // Owned keys keep the stream's futures `Send` for axum handlers.
        let fetch = &fetch;
        let mut resolved: Vec<Option<Result<V, E>>> = vec![None; unique.len()];
        let outcomes: Vec<(usize, Result<V, E>)> = stream::iter(unique.into_iter().enumerate())
            .map(|(slot, key)| async move { (slot, fetch(key).await) })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        for (slot, outcome) in outcomes {
            resolved[slot] = Some(outcome);
        }

        keys.iter()
            .filter_map(|key| {
                let slot = slot_of.get(key.as_str())?;
                resolved[*slot].clone()
            })
            .collect()
    }
}

impl Default for BatchAggregator {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_order_preserved_and_duplicates_fetched_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let aggregator = BatchAggregator::new(4);

        let results = aggregator
            .fetch_batch(&keys(&["BTC", "ETH", "BTC"]), |key| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(key.clone());
                    Ok::<_, String>(format!("{}-price", key))
                }
            })
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok("BTC-price".to_string()));
        assert_eq!(results[1], Ok("ETH-price".to_string()));
        assert_eq!(results[0], results[2]);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|k| *k == "BTC").count(), 1);
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let aggregator = BatchAggregator::new(2);

        let results = aggregator
            .fetch_batch(&keys(&["BTC", "NOPE", "ETH"]), |key| async move {
                if key == "NOPE" {
                    Err(format!("unknown symbol {}", key))
                } else {
                    Ok(key.len())
                }
            })
            .await;

        assert_eq!(results[0], Ok(3));
        assert_eq!(results[1], Err("unknown symbol NOPE".to_string()));
        assert_eq!(results[2], Ok(3));
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        tokio::time::pause();
        let aggregator = BatchAggregator::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let batch = keys(&["A", "B", "C", "D", "E", "F"]);
        let results = aggregator
            .fetch_batch(&batch, |key| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(key)
                }
            })
            .await;

        assert_eq!(results.len(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_batch_future_is_send() {
        let aggregator = BatchAggregator::new(2);
        let batch = keys(&["BTC", "ETH"]);
        assert_send(aggregator.fetch_batch(&batch, |key| async move { Ok::<_, ()>(key) }));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let aggregator = BatchAggregator::default();
        let results: Vec<Result<u8, ()>> = aggregator.fetch_batch(&[], |_| async { Ok(1) }).await;
        assert!(results.is_empty());
    }
}
