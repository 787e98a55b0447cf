//! Market data façade: cache, admission, coalescing and failover in one call.
//!
//! Request flow for one symbol:
//!
//! ```text
//! normalize -> cache hit? -> (miss) single-flight -> admission -> registry
//!                                                                  |
//!                                        cache <- publish to waiters
//! ```
//!
//! Admission is checked by the flight leader only, so callers that join an
//! in-flight fetch never spend a token. A throttled leader fans the
//! throttled error out to its waiters like any other failure.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::batch::BatchAggregator;
use crate::cache::{CacheStats, CacheStore};
use crate::coalescer::{CoalescerStats, RequestCoalescer};
use crate::errors::MarketDataError;
use crate::models::{normalize_symbol, MarketSnapshot};
use crate::registry::{ProviderRegistry, RateLimiter, ResourceClass};

/// Symbols served by the popular endpoint, most capitalized first.
pub const POPULAR_SYMBOLS: [&str; 10] = [
    "BTC", "ETH", "BNB", "ADA", "SOL", "XRP", "DOT", "DOGE", "AVAX", "MATIC",
];

#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    /// How long a snapshot stays fresh.
    pub ttl: Duration,
    /// Lower bound on one coalesced fetch, independent of client timeouts.
    /// The effective budget also covers admission plus one bounded attempt
    /// per provider, see [`MarketDataService::flight_timeout`].
    pub upstream_timeout: Duration,
    /// How long the standard path may wait for admission.
    pub admission_wait: Duration,
    /// LRU bound for the snapshot cache, 0 for unbounded.
    pub max_entries: usize,
    /// Distinct symbols fetched concurrently by a batch.
    pub batch_workers: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(15),
            admission_wait: Duration::from_secs(2),
            max_entries: 2000,
            batch_workers: 4,
        }
    }
}

/// How a cache miss obtains a rate-limiter token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Fail with `Throttled` immediately if no token is available.
    Immediate,
    /// Wait up to the given duration for a token.
    Wait(Duration),
}

pub struct MarketDataService {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    coalescer: RequestCoalescer<MarketSnapshot, MarketDataError>,
    batch: BatchAggregator,
    config: MarketDataConfig,
    flight_timeout: Duration,
}

impl MarketDataService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        config: MarketDataConfig,
    ) -> Self {
        let cache = Arc::new(CacheStore::new("market", config.max_entries));
        let flight_timeout = flight_budget(&config, &registry);
        debug!(
            "Market flight budget {}ms for {} providers",
            flight_timeout.as_millis(),
            registry.len()
        );
        Self {
            coalescer: RequestCoalescer::new(cache, config.ttl, flight_timeout),
            batch: BatchAggregator::new(config.batch_workers),
            registry,
            limiter,
            config,
            flight_timeout,
        }
    }

    /// How long one coalesced fetch may run before its waiters give up.
    pub fn flight_timeout(&self) -> Duration {
        self.flight_timeout
    }

    /// Standard path: waits a bounded time for admission on a miss.
    pub async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        self.get_with(symbol, Admission::Wait(self.config.admission_wait))
            .await
    }

    /// Optimized path: a miss that cannot be admitted right away is
    /// reported as throttled.
    pub async fn get_snapshot_optimized(
        &self,
        symbol: &str,
    ) -> Result<MarketSnapshot, MarketDataError> {
        self.get_with(symbol, Admission::Immediate).await
    }

    pub async fn get_with(
        &self,
        symbol: &str,
        admission: Admission,
    ) -> Result<MarketSnapshot, MarketDataError> {
        let symbol = normalize_symbol(symbol)?;

        let registry = Arc::clone(&self.registry);
        let limiter = Arc::clone(&self.limiter);
        let key = symbol.clone();

        self.coalescer
            .get_or_fetch(&symbol, move || async move {
                match admission {
                    Admission::Immediate => limiter.check(ResourceClass::MarketData)?,
                    Admission::Wait(timeout) => {
                        limiter.wait(ResourceClass::MarketData, timeout).await?
                    }
                }
                debug!("Fetching snapshot for {} from providers", key);
                registry.fetch_snapshot(&key).await
            })
            .await
    }

    /// Resolve several symbols at once, preserving input order.
    ///
    /// Each position carries its own outcome. Duplicates (after
    /// normalization) are fetched once. Misses wait a bounded time for
    /// admission so a burst of distinct symbols degrades into per-symbol
    /// throttled errors instead of failing outright.
    pub async fn get_batch(
        &self,
        symbols: &[String],
    ) -> Vec<(String, Result<MarketSnapshot, MarketDataError>)> {
        let keys: Vec<String> = symbols
            .iter()
            .map(|raw| normalize_symbol(raw).unwrap_or_else(|_| raw.clone()))
            .collect();

        let admission = Admission::Wait(self.config.admission_wait);
        let results = self
            .batch
            .fetch_batch(&keys, move |key| async move { self.get_with(&key, admission).await })
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            "Batch of {} symbols resolved ({} failed)",
            symbols.len(),
            failed
        );

        keys.into_iter().zip(results).collect()
    }

    /// The first `limit` popular symbols through the batch path.
    pub async fn get_popular(
        &self,
        limit: usize,
    ) -> Vec<(String, Result<MarketSnapshot, MarketDataError>)> {
        let symbols: Vec<String> = POPULAR_SYMBOLS
            .iter()
            .take(limit.min(POPULAR_SYMBOLS.len()))
            .map(|s| s.to_string())
            .collect();
        self.get_batch(&symbols).await
    }

    /// Drop the cached snapshot for a symbol.
    pub fn invalidate(&self, symbol: &str) -> Result<bool, MarketDataError> {
        let symbol = normalize_symbol(symbol)?;
        let removed = self.coalescer.cache().invalidate(&symbol);
        info!("Invalidated market cache for {} (present: {})", symbol, removed);
        Ok(removed)
    }

    pub fn clear_cache(&self) -> usize {
        let removed = self.coalescer.cache().clear();
        info!("Cleared {} market cache entries", removed);
        removed
    }

    pub fn purge_expired(&self) -> usize {
        self.coalescer.cache().purge_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.coalescer.cache().stats()
    }

    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.coalescer.stats()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }
}

/// Admission wait plus one attempt per provider, so the last provider still
/// gets its full attempt. Never below `upstream_timeout`.
fn flight_budget(config: &MarketDataConfig, registry: &ProviderRegistry) -> Duration {
    let attempts = u32::try_from(registry.len().max(1)).unwrap_or(u32::MAX);
    let per_attempt = registry
        .attempt_timeout()
        .unwrap_or(config.upstream_timeout);
    let failover = config
        .admission_wait
        .saturating_add(per_attempt.saturating_mul(attempts));
    config.upstream_timeout.max(failover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::provider::MarketDataProvider;
    use crate::registry::RateLimitConfig;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl MarketDataProvider for CountingProvider {
        fn id(&self) -> &'static str {
            "COUNTING"
        }

        async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if symbol == "NOPE" {
                return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
            }
            Ok(MarketSnapshot::new(symbol, symbol, dec!(100), "COUNTING"))
        }
    }

    fn service_with(
        provider: Arc<CountingProvider>,
        limit: RateLimitConfig,
    ) -> MarketDataService {
        let provider: Arc<dyn MarketDataProvider> = provider;
        MarketDataService::new(
            Arc::new(ProviderRegistry::new(vec![provider])),
            Arc::new(RateLimiter::with_limits([(ResourceClass::MarketData, limit)])),
            MarketDataConfig::default(),
        )
    }

    fn generous() -> RateLimitConfig {
        RateLimitConfig::new(6000, 100)
    }

    struct SlowProvider;

    #[async_trait]
    impl MarketDataProvider for SlowProvider {
        fn id(&self) -> &'static str {
            "SLOW"
        }

        fn priority(&self) -> u8 {
            1
        }

        async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(MarketSnapshot::new(symbol, symbol, dec!(1), "SLOW"))
        }
    }

    fn assert_send<T: Send>(_: T) {}

    #[tokio::test]
    async fn test_miss_then_hit_without_second_fetch() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider.clone(), generous());

        let first = service.get_snapshot("btc").await.unwrap();
        let second = service.get_snapshot("BTC").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let stats = service.cache_stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_triggers_refetch() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider.clone(), generous());

        service.get_snapshot("ETH").await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        service.get_snapshot("ETH").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        service.get_snapshot("ETH").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_fetch() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let service = Arc::new(service_with(provider.clone(), RateLimitConfig::new(60, 1)));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.get_snapshot_optimized("SOL").await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_optimized_path_is_throttled_when_bucket_empty() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider.clone(), RateLimitConfig::new(1, 1));

        service.get_snapshot_optimized("BTC").await.unwrap();
        let err = service.get_snapshot_optimized("ETH").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Throttled);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        // Cached symbols are still served.
        assert!(service.get_snapshot_optimized("BTC").await.is_ok());
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_dedupes() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider.clone(), generous());

        let symbols: Vec<String> = ["BTC", "eth", "NOPE", "btc"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let results = service.get_batch(&symbols).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].0, "BTC");
        assert_eq!(results[1].0, "ETH");
        assert!(matches!(
            results[2].1,
            Err(MarketDataError::SymbolNotFound(_))
        ));
        assert_eq!(results[0].1, results[3].1);
        // BTC, ETH and NOPE each fetched once.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_batch_reports_invalid_symbol_per_position() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider, generous());

        let results = service
            .get_batch(&["BTC".to_string(), "BAD/SYM".to_string()])
            .await;

        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(MarketDataError::InvalidSymbol(_))));
    }

    #[tokio::test]
    async fn test_popular_respects_limit() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider, generous());

        let results = service.get_popular(3).await;
        let symbols: Vec<_> = results.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "BNB"]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider.clone(), generous());

        service.get_snapshot("ADA").await.unwrap();
        assert_eq!(service.invalidate("ada"), Ok(true));
        service.get_snapshot("ADA").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.clear_cache(), 1);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_cached() {
        tokio::time::pause();
        let provider = Arc::new(CountingProvider::default());
        let service = service_with(provider.clone(), generous());

        assert!(service.get_snapshot("NOPE").await.is_err());
        assert!(service.get_snapshot("NOPE").await.is_err());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn test_hung_primary_fails_over_within_flight_budget() {
        tokio::time::pause();
        let backup = Arc::new(CountingProvider::default());
        let providers: Vec<Arc<dyn MarketDataProvider>> =
            vec![Arc::new(SlowProvider), backup.clone()];
        let registry = ProviderRegistry::new(providers).with_attempt_timeout(Duration::from_secs(1));
        let service = MarketDataService::new(
            Arc::new(registry),
            Arc::new(RateLimiter::with_limits([(ResourceClass::MarketData, generous())])),
            MarketDataConfig {
                upstream_timeout: Duration::from_secs(1),
                ..MarketDataConfig::default()
            },
        );

        // 2s admission wait + two 1s attempts.
        assert_eq!(service.flight_timeout(), Duration::from_secs(4));

        let snapshot = service.get_snapshot("BTC").await.unwrap();
        assert_eq!(snapshot.source, "COUNTING");
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);

        let circuits = service.registry().circuits();
        let slow = circuits.iter().find(|c| c.provider == "SLOW").unwrap();
        assert_eq!(slow.consecutive_failures, 1);
    }

    #[test]
    fn test_flight_budget_never_below_upstream_timeout() {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(CountingProvider::default());
        let registry = ProviderRegistry::new(vec![provider]);
        let config = MarketDataConfig::default();
        assert_eq!(flight_budget(&config, &registry), Duration::from_secs(17));

        let registry = registry.with_attempt_timeout(Duration::from_millis(100));
        assert_eq!(flight_budget(&config, &registry), config.upstream_timeout);
    }

    #[test]
    fn test_batch_and_popular_futures_are_send() {
        let service = service_with(Arc::new(CountingProvider::default()), generous());
        let symbols = vec!["BTC".to_string()];
        assert_send(service.get_batch(&symbols));
        assert_send(service.get_popular(3));
        assert_send(service.get_snapshot("BTC"));
    }
}
