//! Background cache maintenance.
//!
//! - The sweeper drops expired entries. Reads already ignore them; the sweep
//!   only bounds memory held by keys nobody asks for again.
//! - The warmer refreshes popular symbols at startup and then periodically,
//!   so the first client requests after a quiet period hit the cache.

use std::sync::Arc;

use cryptoinsight_market_data::{ResourceClass, POPULAR_SYMBOLS};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::main_lib::AppState;

/// Starts the periodic cache sweep on the current runtime.
pub fn start_cache_sweeper(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        info!("Cache sweeper started ({}s interval)", every.as_secs());

        let mut ticker = interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_sweep(&state);
        }
    });
}

/// Purges expired entries from every cache, returning how many were removed.
pub fn run_sweep(state: &AppState) -> usize {
    let market = state.market.purge_expired();
    let ai = state.ai.purge_expired();
    let removed = market + ai;
    if removed > 0 {
        info!(
            "Cache sweep removed {} expired entries ({} market, {} AI)",
            removed, market, ai
        );
    } else {
        debug!("Cache sweep found no expired entries");
    }
    removed
}

/// Starts the popular-symbol warmer. The first run happens immediately.
/// A zero interval disables warming.
pub fn start_cache_warmer(state: Arc<AppState>, every: Duration) {
    if every.is_zero() {
        info!("Cache warmer disabled");
        return;
    }
    tokio::spawn(async move {
        info!("Cache warmer started ({}s interval)", every.as_secs());

        let mut ticker = interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            run_warmup(&state).await;
        }
    });
}

/// Refreshes popular symbols through the batch path.
///
/// Spends at most half of the market tokens available right now, so client
/// requests keep their quota. Cached symbols cost nothing. Returns how many
/// symbols were warmed.
pub async fn run_warmup(state: &AppState) -> usize {
    let spare = state.limiter.remaining_tokens(ResourceClass::MarketData);
    let budget = ((spare / 2.0).floor() as usize).min(POPULAR_SYMBOLS.len());
    if budget == 0 {
        debug!("Skipping warm-up, market quota is low ({:.1} tokens)", spare);
        return 0;
    }

    let results = state.market.get_popular(budget).await;
    let warmed = results.iter().filter(|(_, result)| result.is_ok()).count();
    info!("Warm-up refreshed {}/{} popular symbols", warmed, budget);
    warmed
}
