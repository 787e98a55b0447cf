//! Response envelope and request DTOs for the HTTP API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cryptoinsight_market_data::{
    CacheStats, CircuitSnapshot, ErrorKind, MarketDataError, MarketSnapshot,
};
use serde::{Deserialize, Serialize};

/// Envelope returned by every successful API call.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }
}

/// One position of a batch response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub symbol: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MarketSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<(String, Result<MarketSnapshot, MarketDataError>)> for BatchItem {
    fn from((symbol, result): (String, Result<MarketSnapshot, MarketDataError>)) -> Self {
        match result {
            Ok(snapshot) => Self {
                symbol,
                success: true,
                data: Some(snapshot),
                error: None,
                error_kind: None,
            },
            Err(e) => Self {
                symbol,
                success: false,
                data: None,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
            },
        }
    }
}

/// Aggregated cache statistics across every store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub total: CacheStats,
    pub stores: BTreeMap<&'static str, CacheStats>,
    pub pending_fetches: usize,
    pub coalesced_requests: u64,
    pub remaining_tokens: BTreeMap<&'static str, f64>,
    pub circuits: Vec<CircuitSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheResponse {
    pub market_entries: usize,
    pub ai_entries: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub symbol: String,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuestionBody {
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarQuery {
    pub limit: Option<usize>,
    pub include_analysis: Option<bool>,
    pub include_market_data: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CompareBody {
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<usize>,
}
