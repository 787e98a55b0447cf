//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Concrete provider implementations (CoinGecko, CoinPaprika)
//!
//! Providers only translate one upstream API into [`MarketSnapshot`]s.
//! Caching, coalescing, admission control and failover live above them.
//!
//! [`MarketSnapshot`]: crate::models::MarketSnapshot

mod http;
mod traits;

pub mod coingecko;
pub mod coinpaprika;

pub use traits::MarketDataProvider;
