//! CoinPaprika market data provider.
//!
//! CoinPaprika keys coins by slug (`btc-bitcoin`), so a lookup is two calls:
//! `/search` resolves the ticker to the best-ranked active coin, then
//! `/tickers/{id}` returns the USD quote. Resolved ids are remembered for
//! the life of the provider.
//!
//! No API key needed; the free tier allows about 25 calls per minute.
//! API documentation: https://api.coinpaprika.com

use std::collections::HashMap;
use std::sync::Mutex;
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

pub const DEFAULT_BASE_URL: &str = "https://api.coinpaprika.com/v1";
const PROVIDER_ID: &str = "COINPAPRIKA";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    currencies: Vec<SearchCurrency>,
}

#[derive(Debug, Deserialize)]
struct SearchCurrency {
    id: String,
    symbol: String,
    rank: Option<u32>,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    name: String,
    rank: Option<u32>,
    circulating_supply: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
    quotes: HashMap<String, TickerQuote>,
}

#[derive(Debug, Deserialize)]
struct TickerQuote {
    price: Option<f64>,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
    percent_change_24h: Option<f64>,
}

pub struct CoinPaprikaProvider {
    client: Client,
    base_url: String,
    ids: Mutex<HashMap<String, String>>,
}

impl CoinPaprikaProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ids: Mutex::new(HashMap::new()),
        }
    }

    fn remembered_id(&self, symbol: &str) -> Option<String> {
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(symbol)
            .cloned()
    }

    async fn resolve_id(&self, symbol: &str) -> Result<String, MarketDataError> {
        if let Some(id) = self.remembered_id(symbol) {
            return Ok(id);
        }

        let url = format!("{}/search", self.base_url);
        let response: SearchResponse = get_json(
            &self.client,
            PROVIDER_ID,
            &url,
            &[("q", symbol), ("c", "currencies"), ("limit", "10")],
        )
        .await?;

        let id = pick_currency(symbol, response.currencies)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        debug!("CoinPaprika: resolved {} to {}", symbol, id);
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(symbol.to_string(), id.clone());
        Ok(id)
    }
}

impl Default for CoinPaprikaProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-ranked active currency whose ticker matches exactly.
fn pick_currency(symbol: &str, currencies: Vec<SearchCurrency>) -> Option<String> {
    currencies
        .into_iter()
        .filter(|c| c.is_active && c.symbol.eq_ignore_ascii_case(symbol))
        .min_by_key(|c| c.rank.filter(|r| *r > 0).unwrap_or(u32::MAX))
        .map(|c| c.id)
}

fn ticker_to_snapshot(
    symbol: &str,
    ticker: TickerResponse,
) -> Result<MarketSnapshot, MarketDataError> {
    let quote = ticker
        .quotes
        .get("USD")
        .ok_or_else(|| MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("No USD quote for {}", symbol),
        })?;

    let price = quote
        .price
        .and_then(to_decimal)
        .ok_or_else(|| MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("No price for {}", symbol),
        })?;

    Ok(MarketSnapshot {
        symbol: symbol.to_string(),
        name: ticker.name,
        price,
        market_cap: quote.market_cap.and_then(to_decimal),
        volume_24h: quote.volume_24h.and_then(to_decimal),
        percent_change_24h: quote.percent_change_24h.and_then(to_decimal),
        market_cap_rank: ticker.rank.filter(|r| *r > 0),
        circulating_supply: ticker.circulating_supply.and_then(to_decimal),
        source: PROVIDER_ID.to_string(),
        last_updated: ticker.last_updated.unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl MarketDataProvider for CoinPaprikaProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        debug!("Fetching {} from CoinPaprika", symbol);
        let id = self.resolve_id(symbol).await?;

        let url = format!("{}/tickers/{}", self.base_url, urlencoding::encode(&id));
        let ticker: TickerResponse = get_json(&self.client, PROVIDER_ID, &url, &[]).await?;

        ticker_to_snapshot(symbol, ticker)
    }
}
