//! Upstream protection and orchestration.
//!
//! - Admission control per resource class (token buckets)
//! - Circuit breaking per provider
//! - Provider registration, priority ordering and failover

mod circuit_breaker;
mod provider_registry;
mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use provider_registry::{ProviderInfo, ProviderRegistry};
pub use rate_limiter::{RateLimitConfig, RateLimiter, ResourceClass, Throttled};
