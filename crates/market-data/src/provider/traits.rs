//! Market data provider trait definitions.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::MarketSnapshot;

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source. The
/// registry orders providers by [`priority`](Self::priority) and falls over
/// to the next one according to the error's retry class.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use cryptoinsight_market_data::provider::MarketDataProvider;
///
/// struct FixedPriceProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for FixedPriceProvider {
///     fn id(&self) -> &'static str {
///         "FIXED"
///     }
///
///     async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
///         Ok(MarketSnapshot::new(symbol, symbol, dec!(1), self.id()))
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "COINGECKO". Used for logging,
    /// circuit breaker tracking and the snapshot's `source` field.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Fetch the current snapshot for a normalized (upper-case) symbol.
    ///
    /// Returns `SymbolNotFound` when the provider does not list the symbol.
    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError>;
}
