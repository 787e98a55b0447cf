//! Single-flight request coalescing on top of a [`CacheStore`].
//!
//! For any key at most one upstream fetch is in flight. The first caller to
//! miss becomes the leader: its fetch runs on a spawned task with a bounded
//! timeout, populates the cache on success and publishes the outcome on a
//! `watch` channel. Every caller that misses while the fetch is pending
//! subscribes to that channel instead of fetching again, so all of them see
//! the identical result.
//!
//! A caller that gives up (client timeout, dropped future) only drops its
//! receiver. The fetch task and the other waiters are unaffected.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::cache::CacheStore;

/// Failure of the flight itself rather than of the fetch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlightError {
    /// The fetch did not finish within the upstream timeout.
    #[error("upstream fetch timed out after {0:?}")]
    TimedOut(Duration),
    /// The fetch task ended without publishing a result (it panicked).
    #[error("upstream fetch was abandoned")]
    Abandoned,
}

type Outcome<V, E> = Option<Result<V, E>>;
type PendingMap<V, E> = HashMap<String, watch::Receiver<Outcome<V, E>>>;

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoalescerStats {
    /// Upstream fetches started.
    pub fetches: u64,
    /// Callers that joined an existing fetch instead of starting one.
    pub coalesced: u64,
    /// Fetches currently in flight.
    pub pending: usize,
}

/// Removes the pending entry for a key when dropped, including on panic.
struct PendingGuard<V, E> {
    pending: Arc<Mutex<PendingMap<V, E>>>,
    key: String,
}

impl<V, E> Drop for PendingGuard<V, E> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.remove(&self.key);
    }
}

/// Deduplicates concurrent fetches per key and caches their results.
pub struct RequestCoalescer<V, E> {
    cache: Arc<CacheStore<V>>,
    ttl: Duration,
    upstream_timeout: Duration,
    pending: Arc<Mutex<PendingMap<V, E>>>,
    fetches: AtomicU64,
    coalesced: AtomicU64,
}

impl<V, E> RequestCoalescer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<FlightError> + 'static,
{
    /// `ttl` applies to values this coalescer writes into `cache`.
    pub fn new(cache: Arc<CacheStore<V>>, ttl: Duration, upstream_timeout: Duration) -> Self {
        Self {
            cache,
            ttl,
            upstream_timeout,
            pending: Arc::new(Mutex::new(HashMap::new())),
            fetches: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore<V>> {
        &self.cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingMap<V, E>> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            warn!("Coalescer pending table mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Serve `key` from cache, or fetch it through the single-flight path.
    ///
    /// The cache lookup counts towards hit/miss statistics.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch_fn: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }
        self.fetch(key, fetch_fn).await
    }

    /// Fetch `key`, joining an in-flight fetch if there is one.
    ///
    /// `fetch_fn` is only called when this caller becomes the leader. On
    /// success the value is cached before any waiter is released. On
    /// failure nothing is cached and the next caller starts a new fetch.
    pub async fn fetch<F, Fut>(&self, key: &str, fetch_fn: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut receiver = {
            let mut pending = self.lock_pending();

            // A flight may have landed between the caller's miss and now.
            if let Some(value) = self.cache.peek(key) {
                return Ok(value);
            }

            match pending.get(key) {
                Some(receiver) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!("Coalescer: joining in-flight fetch for '{}'", key);
                    receiver.clone()
                }
                None => {
                    let (sender, receiver) = watch::channel(None);
                    pending.insert(key.to_string(), receiver.clone());
                    self.fetches.fetch_add(1, Ordering::Relaxed);
                    debug!("Coalescer: starting fetch for '{}'", key);
                    self.spawn_flight(key.to_string(), fetch_fn(), sender);
                    receiver
                }
            }
        };

        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map(|published| published.clone());

        match outcome {
            Ok(Some(result)) => result,
            Ok(None) | Err(_) => Err(E::from(FlightError::Abandoned)),
        }
    }

    fn spawn_flight<Fut>(&self, key: String, fut: Fut, sender: watch::Sender<Outcome<V, E>>)
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            key,
        };
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let upstream_timeout = self.upstream_timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(upstream_timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Coalescer: fetch for '{}' timed out after {:?}",
                        guard.key, upstream_timeout
                    );
                    Err(E::from(FlightError::TimedOut(upstream_timeout)))
                }
            };

            if let Ok(value) = &result {
                cache.put(guard.key.clone(), value.clone(), ttl);
            }
            // Unregister before publishing: late callers see the cache entry
            // or start a fresh flight, never a finished one.
            drop(guard);
            let _ = sender.send(Some(result));
        });
    }

    /// Fetches currently in flight.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            pending: self.pending_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Debug, PartialEq)]
    enum TestError {
        Upstream(String),
        Flight(FlightError),
    }

    impl From<FlightError> for TestError {
        fn from(e: FlightError) -> Self {
            Self::Flight(e)
        }
    }

    fn coalescer(timeout: Duration) -> RequestCoalescer<u64, TestError> {
        RequestCoalescer::new(
            Arc::new(CacheStore::new("test", 0)),
            Duration::from_secs(60),
            timeout,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_fetch_once() {
        let coalescer = Arc::new(coalescer(Duration::from_secs(5)));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    coalescer
                        .get_or_fetch("BTC", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(42)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.pending_count(), 0);
        assert_eq!(coalescer.cache().peek("BTC"), Some(42));
        assert_eq!(coalescer.stats().fetches, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_fans_out_and_is_not_cached() {
        let coalescer = Arc::new(coalescer(Duration::from_secs(5)));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    coalescer
                        .get_or_fetch("BAD", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err(TestError::Upstream("boom".to_string()))
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                Err(TestError::Upstream("boom".to_string()))
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(coalescer.cache().is_empty());

        // The failed flight is gone, so a retry fetches again.
        let retry = coalescer.get_or_fetch("BAD", || async { Ok(7) }).await;
        assert_eq!(retry, Ok(7));
    }

    #[tokio::test]
    async fn test_cached_value_skips_fetch() {
        tokio::time::pause();
        let coalescer = coalescer(Duration::from_secs(5));
        coalescer.get_or_fetch("ETH", || async { Ok(1) }).await.unwrap();

        let second = coalescer
            .get_or_fetch("ETH", || async { panic!("should not fetch") })
            .await;

        assert_eq!(second, Ok(1));
        let stats = coalescer.cache().stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        tokio::time::pause();
        let coalescer = coalescer(Duration::from_secs(5));
        coalescer.get_or_fetch("ETH", || async { Ok(1) }).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        let value = coalescer.get_or_fetch("ETH", || async { Ok(2) }).await;

        assert_eq!(value, Ok(2));
        assert_eq!(coalescer.stats().fetches, 2);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        tokio::time::pause();
        let coalescer = coalescer(Duration::from_secs(1));

        let result = coalescer
            .get_or_fetch("SLOW", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1)
            })
            .await;

        assert_eq!(
            result,
            Err(TestError::Flight(FlightError::TimedOut(Duration::from_secs(1))))
        );
        assert_eq!(coalescer.pending_count(), 0);
        assert!(coalescer.cache().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_waiter_does_not_affect_others() {
        let coalescer = Arc::new(coalescer(Duration::from_secs(5)));

        let impatient = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                tokio::time::timeout(
                    Duration::from_millis(10),
                    coalescer.get_or_fetch("SOL", || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(150)
                    }),
                )
                .await
            })
        };
        // By now the impatient caller has given up; its fetch is still running.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let patient = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                coalescer
                    .get_or_fetch("SOL", || async { Ok(999) })
                    .await
            })
        };

        assert!(impatient.await.unwrap().is_err());
        assert_eq!(patient.await.unwrap(), Ok(150));
        assert_eq!(coalescer.cache().peek("SOL"), Some(150));
    }

    #[tokio::test]
    async fn test_panicking_fetch_releases_waiters() {
        let coalescer = coalescer(Duration::from_secs(5));

        let result = coalescer
            .get_or_fetch("PANIC", || async { panic!("fetch exploded") })
            .await;

        assert_eq!(result, Err(TestError::Flight(FlightError::Abandoned)));
        assert_eq!(coalescer.pending_count(), 0);
    }
}
