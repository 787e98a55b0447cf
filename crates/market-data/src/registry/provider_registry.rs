//! Provider registry for orchestrating market data providers.
//!
//! The registry tries providers in priority order and decides after each
//! failure whether to fall over, using the error's [`RetryClass`]:
//!
//! - `Never`: return the error (unknown symbol, bad request)
//! - `FailoverWithPenalty`: record a circuit-breaker failure, try the next
//! - `NextProvider`: try the next provider without penalty
//! - `CircuitOpen`: skip
//!
//! With an attempt timeout set, a provider that does not answer in time is
//! treated like any other timeout: penalized, then skipped for the next one.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use super::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::MarketSnapshot;
use crate::provider::MarketDataProvider;

/// Registered provider, as reported by the health endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub priority: u8,
}

pub struct ProviderRegistry {
    /// Sorted by ascending priority.
    providers: Vec<Arc<dyn MarketDataProvider>>,
    circuit_breaker: CircuitBreaker,
    attempt_timeout: Option<Duration>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_circuit_breaker(providers, CircuitBreaker::new())
    }

    pub fn with_circuit_breaker(
        mut providers: Vec<Arc<dyn MarketDataProvider>>,
        circuit_breaker: CircuitBreaker,
    ) -> Self {
        // Stable sort keeps registration order among equal priorities.
        providers.sort_by_key(|p| p.priority());
        Self {
            providers,
            circuit_breaker,
            attempt_timeout: None,
        }
    }

    /// Bound each provider call so a hung provider still leaves time to
    /// fall over within the caller's budget.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Fetch a snapshot from the first provider that can serve it.
    pub async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        if self.providers.is_empty() {
            return Err(MarketDataError::NoProvidersAvailable);
        }

        let mut last_error: Option<MarketDataError> = None;

        for provider in &self.providers {
            let provider_id = provider.id();

            if !self.circuit_breaker.is_allowed(provider_id) {
                debug!("Skipping '{}' for {}: circuit open", provider_id, symbol);
                last_error.get_or_insert(MarketDataError::CircuitOpen {
                    provider: provider_id.to_string(),
                });
                continue;
            }

            let attempt = provider.fetch_snapshot(symbol);
            let outcome = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, attempt).await.unwrap_or_else(|_| {
                    Err(MarketDataError::Timeout {
                        provider: provider_id.to_string(),
                    })
                }),
                None => attempt.await,
            };

            match outcome {
                Ok(snapshot) => {
                    self.circuit_breaker.record_success(provider_id);
                    return Ok(snapshot);
                }
                Err(e) => match e.retry_class() {
                    RetryClass::Never => return Err(e),
                    RetryClass::FailoverWithPenalty => {
                        warn!(
                            "Provider '{}' failed for {}: {}; recording circuit failure",
                            provider_id, symbol, e
                        );
                        self.circuit_breaker.record_failure(provider_id);
                        last_error = Some(e);
                    }
                    RetryClass::NextProvider | RetryClass::CircuitOpen => {
                        warn!("Provider '{}' failed for {}: {}", provider_id, symbol, e);
                        last_error = Some(e);
                    }
                },
            }
        }

        Err(last_error.unwrap_or(MarketDataError::AllProvidersFailed))
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|p| ProviderInfo {
                id: p.id(),
                priority: p.priority(),
            })
            .collect()
    }

    pub fn circuits(&self) -> Vec<CircuitSnapshot> {
        self.circuit_breaker.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CircuitBreakerConfig, CircuitState};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockProvider {
        id: &'static str,
        priority: u8,
        call_count: AtomicUsize,
        error: Option<MarketDataError>,
        delay: Duration,
    }

    impl MockProvider {
        fn ok(id: &'static str, priority: u8) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                call_count: AtomicUsize::new(0),
                error: None,
                delay: Duration::ZERO,
            })
        }

        fn slow(id: &'static str, priority: u8, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                call_count: AtomicUsize::new(0),
                error: None,
                delay,
            })
        }

        fn failing(id: &'static str, priority: u8, error: MarketDataError) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                call_count: AtomicUsize::new(0),
                error: Some(error),
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(MarketSnapshot::new(symbol, symbol, dec!(100), self.id)),
            }
        }
    }

    fn dyns(providers: &[&Arc<MockProvider>]) -> Vec<Arc<dyn MarketDataProvider>> {
        providers
            .iter()
            .map(|p| Arc::clone(*p) as Arc<dyn MarketDataProvider>)
            .collect()
    }

    fn rate_limited(provider: &str) -> MarketDataError {
        MarketDataError::RateLimited {
            provider: provider.to_string(),
        }
    }

    #[tokio::test]
    async fn test_providers_tried_by_priority() {
        let primary = MockProvider::ok("PRIMARY", 1);
        let secondary = MockProvider::ok("SECONDARY", 2);
        let registry = ProviderRegistry::new(dyns(&[&secondary, &primary]));

        let snapshot = registry.fetch_snapshot("BTC").await.unwrap();

        assert_eq!(snapshot.source, "PRIMARY");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(registry.providers()[0].id, "PRIMARY");
    }

    #[tokio::test]
    async fn test_failover_on_provider_error() {
        let primary = MockProvider::failing(
            "PRIMARY",
            1,
            MarketDataError::ProviderError {
                provider: "PRIMARY".to_string(),
                message: "HTTP 500".to_string(),
            },
        );
        let secondary = MockProvider::ok("SECONDARY", 2);
        let registry = ProviderRegistry::new(dyns(&[&primary, &secondary]));

        let snapshot = registry.fetch_snapshot("ETH").await.unwrap();

        assert_eq!(snapshot.source, "SECONDARY");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_symbol_not_found_stops_failover() {
        let primary = MockProvider::failing(
            "PRIMARY",
            1,
            MarketDataError::SymbolNotFound("NOPE".to_string()),
        );
        let secondary = MockProvider::ok("SECONDARY", 2);
        let registry = ProviderRegistry::new(dyns(&[&primary, &secondary]));

        let result = registry.fetch_snapshot("NOPE").await;

        assert_eq!(result, Err(MarketDataError::SymbolNotFound("NOPE".to_string())));
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_error() {
        let a = MockProvider::failing("A", 1, rate_limited("A"));
        let b = MockProvider::failing("B", 2, rate_limited("B"));
        let registry = ProviderRegistry::new(dyns(&[&a, &b]));

        let result = registry.fetch_snapshot("BTC").await;
        assert_eq!(result, Err(rate_limited("B")));
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = ProviderRegistry::new(Vec::new());
        assert_eq!(
            registry.fetch_snapshot("BTC").await,
            Err(MarketDataError::NoProvidersAvailable)
        );
    }

    #[tokio::test]
    async fn test_penalized_failures_open_circuit() {
        tokio::time::pause();
        let flaky = MockProvider::failing("FLAKY", 1, rate_limited("FLAKY"));
        let backup = MockProvider::ok("BACKUP", 2);
        let registry = ProviderRegistry::with_circuit_breaker(
            dyns(&[&flaky, &backup]),
            CircuitBreaker::with_config(CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
                half_open_success_threshold: 1,
            }),
        );

        for _ in 0..3 {
            registry.fetch_snapshot("BTC").await.unwrap();
        }

        // Third request skipped the open circuit entirely.
        assert_eq!(flaky.calls(), 2);
        assert_eq!(backup.calls(), 3);
        let circuits = registry.circuits();
        let flaky_circuit = circuits.iter().find(|c| c.provider == "FLAKY").unwrap();
        assert_eq!(flaky_circuit.state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_and_fails_over() {
        tokio::time::pause();
        let slow = MockProvider::slow("SLOW", 1, Duration::from_secs(30));
        let backup = MockProvider::ok("BACKUP", 2);
        let registry = ProviderRegistry::new(dyns(&[&slow, &backup]))
            .with_attempt_timeout(Duration::from_secs(1));

        let snapshot = registry.fetch_snapshot("BTC").await.unwrap();

        assert_eq!(snapshot.source, "BACKUP");
        assert_eq!(slow.calls(), 1);
        let circuits = registry.circuits();
        let slow_circuit = circuits.iter().find(|c| c.provider == "SLOW").unwrap();
        assert_eq!(slow_circuit.state, CircuitState::Closed);
        assert_eq!(slow_circuit.consecutive_failures, 1);
    }
}
