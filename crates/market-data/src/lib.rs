//! CryptoInsight Market Data Crate
//!
//! Provider-agnostic access to cryptocurrency market snapshots behind a
//! caching, coalescing and rate-limiting façade.
//!
//! # Architecture
//!
//! ```text
//! +--------------------+
//! | MarketDataService  |  normalize, single / batch / popular
//! +--------------------+
//!           |
//!           v
//! +--------------------+     +------------------+
//! |  RequestCoalescer  | --> |    CacheStore    |  (TTL + LRU, stats)
//! +--------------------+     +------------------+
//!           | (leader only)
//!           v
//! +--------------------+
//! |    RateLimiter     |  (token bucket per resource class)
//! +--------------------+
//!           |
//!           v
//! +--------------------+     +------------------+
//! |  ProviderRegistry  | --> |  CircuitBreaker  |
//! +--------------------+     +------------------+
//!           |
//!           v
//! +--------------------+
//! |     Provider       |  (CoinGecko, CoinPaprika)
//! +--------------------+
//! ```
//!
//! The cache, coalescer, limiter and batch aggregator are generic and are
//! reused by the AI crate for answers and similarity results.

pub mod batch;
pub mod cache;
pub mod coalescer;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod service;

pub use batch::BatchAggregator;
pub use cache::{CacheStats, CacheStore};
pub use coalescer::{CoalescerStats, FlightError, RequestCoalescer};
pub use errors::{ErrorKind, MarketDataError, RetryClass};
pub use models::{normalize_symbol, MarketSnapshot};
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::coinpaprika::CoinPaprikaProvider;
pub use provider::MarketDataProvider;
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState, ProviderInfo,
    ProviderRegistry, RateLimitConfig, RateLimiter, ResourceClass, Throttled,
};
pub use service::{Admission, MarketDataConfig, MarketDataService, POPULAR_SYMBOLS};
