mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{test_app, test_app_with};
use cryptoinsight_market_data::RateLimitConfig;
use cryptoinsight_server::{config::Config, scheduler};

#[tokio::test]
async fn warmup_fills_cache_within_half_the_quota() {
    let app = test_app();

    // Burst of 10 leaves room for 5 warm fetches.
    assert_eq!(scheduler::run_warmup(&app.state).await, 5);
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 5);
    assert_eq!(app.state.market.cache_stats().size, 5);

    let response = app.get("/api/v1/optimized/crypto/BTC").await;
    assert_eq!(response.body["success"], true);
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn repeated_warmup_is_served_from_cache() {
    let app = test_app();
    scheduler::run_warmup(&app.state).await;

    let warmed = scheduler::run_warmup(&app.state).await;
    assert!(warmed > 0);
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn warmup_skips_when_quota_is_low() {
    let app = test_app_with(Config {
        market_limit: RateLimitConfig::new(30, 1),
        ..Config::default()
    });

    assert_eq!(scheduler::run_warmup(&app.state).await, 0);
    assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);

    // The client request still gets the token.
    let response = app.get("/api/v1/optimized/crypto/BTC").await;
    assert_eq!(response.body["success"], true);
}

#[tokio::test(start_paused = true)]
async fn sweep_removes_expired_entries() {
    let app = test_app();
    app.get("/api/v1/crypto/BTC").await;
    app.get("/api/v1/crypto/ETH").await;
    assert_eq!(scheduler::run_sweep(&app.state), 0);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(scheduler::run_sweep(&app.state), 2);
    assert_eq!(app.state.market.cache_stats().size, 0);
}
