//! CoinGecko market data provider.
//!
//! Uses the public `/coins/markets` endpoint, which accepts ticker symbols
//! directly and returns price, market cap, volume and 24h change in one call.
//! Several coins can share a ticker; the one with the best market-cap rank
//! wins.
//!
//! The free tier allows roughly 30 calls per minute.
//! API documentation: https://docs.coingecko.com/reference/coins-markets

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::http::{build_client, get_json, to_decimal, DEFAULT_HTTP_TIMEOUT};
use crate::errors::MarketDataError;
use crate::models::MarketSnapshot;
use crate::provider::MarketDataProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER_ID: &str = "COINGECKO";

/// One row of the `/coins/markets` response.
#[derive(Debug, Deserialize)]
struct MarketRow {
    symbol: String,
    name: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    total_volume: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    circulating_supply: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
}

pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_HTTP_TIMEOUT)
    }

    /// Point the provider at another deployment (pro API, proxy, mock).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn to_snapshot(symbol: &str, rows: Vec<MarketRow>) -> Result<MarketSnapshot, MarketDataError> {
        let row = rows
            .into_iter()
            .filter(|row| row.symbol.eq_ignore_ascii_case(symbol))
            .min_by_key(|row| row.market_cap_rank.unwrap_or(u32::MAX))
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = row
            .current_price
            .and_then(to_decimal)
            .ok_or_else(|| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("No price for {}", symbol),
            })?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            name: row.name,
            price,
            market_cap: row.market_cap.and_then(to_decimal),
            volume_24h: row.total_volume.and_then(to_decimal),
            percent_change_24h: row.price_change_percentage_24h.and_then(to_decimal),
            market_cap_rank: row.market_cap_rank,
            circulating_supply: row.circulating_supply.and_then(to_decimal),
            source: PROVIDER_ID.to_string(),
            last_updated: row.last_updated.unwrap_or_else(Utc::now),
        })
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        debug!("Fetching {} from CoinGecko", symbol);
        let url = format!("{}/coins/markets", self.base_url);
        let lower = symbol.to_ascii_lowercase();
        let rows: Vec<MarketRow> = get_json(
            &self.client,
            PROVIDER_ID,
            &url,
            &[("vs_currency", "usd"), ("symbols", lower.as_str())],
        )
        .await?;

        Self::to_snapshot(symbol, rows)
    }
}
