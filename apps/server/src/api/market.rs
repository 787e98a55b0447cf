use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cryptoinsight_market_data::{
    normalize_symbol, CacheStats, CircuitSnapshot, MarketSnapshot, ProviderInfo, ResourceClass,
    POPULAR_SYMBOLS,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::{
        ApiResponse, BatchItem, CacheStatsResponse, ClearCacheResponse, InvalidateResponse,
        PopularQuery,
    },
};

pub const MAX_BATCH_SYMBOLS: usize = 20;

/// Standard path: waits briefly for admission on a cache miss.
async fn get_crypto(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<ApiResponse<MarketSnapshot>>> {
    let snapshot = state.market.get_snapshot(&symbol).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// Optimized path: a miss that cannot be admitted right away is a 429.
async fn get_crypto_optimized(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<ApiResponse<MarketSnapshot>>> {
    let snapshot = state.market.get_snapshot_optimized(&symbol).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

async fn get_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<String>>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Vec<BatchItem>>>> {
    let Json(symbols) = body?;
    if symbols.is_empty() {
        return Err(ApiError::BadRequest("At least one symbol is required".to_string()));
    }
    if symbols.len() > MAX_BATCH_SYMBOLS {
        return Err(ApiError::BadRequest(format!(
            "Maximum {} symbols allowed per batch request",
            MAX_BATCH_SYMBOLS
        )));
    }

    let items: Vec<BatchItem> = state
        .market
        .get_batch(&symbols)
        .await
        .into_iter()
        .map(BatchItem::from)
        .collect();
    Ok(Json(ApiResponse::ok(items)))
}

async fn get_popular(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PopularQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Vec<BatchItem>>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(POPULAR_SYMBOLS.len());
    if !(1..=POPULAR_SYMBOLS.len()).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "Limit must be between 1 and {}",
            POPULAR_SYMBOLS.len()
        )));
    }

    let items: Vec<BatchItem> = state
        .market
        .get_popular(limit)
        .await
        .into_iter()
        .map(BatchItem::from)
        .collect();
    Ok(Json(ApiResponse::ok(items)))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<CacheStatsResponse>> {
    let mut stores: BTreeMap<&'static str, CacheStats> = BTreeMap::new();
    stores.insert("market", state.market.cache_stats());
    stores.extend(state.ai.cache_stats());

    let remaining_tokens = ResourceClass::ALL
        .iter()
        .map(|class| (class.as_str(), state.limiter.remaining_tokens(*class)))
        .collect();
    let coalescer = state.market.coalescer_stats();

    Json(ApiResponse::ok(CacheStatsResponse {
        total: CacheStats::combine(stores.values()),
        stores,
        pending_fetches: coalescer.pending + state.ai.pending_fetches(),
        coalesced_requests: coalescer.coalesced,
        remaining_tokens,
        circuits: state.market.registry().circuits(),
    }))
}

async fn invalidate_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<ApiResponse<InvalidateResponse>>> {
    let symbol = normalize_symbol(&symbol)?;
    let removed = state.market.invalidate(&symbol)?;
    let message = if removed {
        format!("Cache cleared for {}", symbol)
    } else {
        format!("No cached data for {}", symbol)
    };
    Ok(Json(ApiResponse::ok_with_message(
        InvalidateResponse { symbol, removed },
        message,
    )))
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ClearCacheResponse>> {
    let cleared = ClearCacheResponse {
        market_entries: state.market.clear_cache(),
        ai_entries: state.ai.clear_caches(),
    };
    tracing::info!(
        "Cleared all caches ({} market, {} AI entries)",
        cleared.market_entries,
        cleared.ai_entries
    );
    Json(ApiResponse::ok_with_message(cleared, "All caches cleared"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimizedHealth {
    status: &'static str,
    service: &'static str,
    features: [&'static str; 3],
    providers: Vec<ProviderInfo>,
    circuits: Vec<CircuitSnapshot>,
    uptime_secs: u64,
    timestamp: DateTime<Utc>,
}

async fn optimized_health(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<OptimizedHealth>> {
    Json(ApiResponse::ok(OptimizedHealth {
        status: "healthy",
        service: "optimized-market-data",
        features: ["smart_caching", "request_throttling", "batch_optimization"],
        providers: state.market.registry().providers(),
        circuits: state.market.registry().circuits(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/crypto/{symbol}", get(get_crypto))
        .route("/optimized/crypto/batch", post(get_batch))
        .route("/optimized/crypto/popular", get(get_popular))
        .route("/optimized/crypto/{symbol}", get(get_crypto_optimized))
        .route("/optimized/cache/stats", get(cache_stats))
        .route("/optimized/cache", delete(clear_cache))
        .route("/optimized/cache/all", delete(clear_cache))
        .route("/optimized/cache/{symbol}", delete(invalidate_symbol))
        .route("/optimized/health", get(optimized_health))
}
