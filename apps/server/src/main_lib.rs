use std::sync::Arc;
use std::time::Instant;

use cryptoinsight_ai::{AiConfig, AiInsightService, AnswerBackend, OllamaBackend, OllamaConfig};
use cryptoinsight_market_data::{
    Admission, CoinGeckoProvider, CoinPaprikaProvider, MarketDataConfig, MarketDataProvider,
    MarketDataService, ProviderRegistry, RateLimiter, ResourceClass,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub market: Arc<MarketDataService>,
    pub ai: Arc<AiInsightService>,
    /// Shared by both services; exposed for cache stats.
    pub limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Build the application state with the public market data providers and
/// the Ollama backend.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
        Arc::new(CoinGeckoProvider::with_base_url(
            &config.coingecko_url,
            config.provider_timeout,
        )),
        Arc::new(CoinPaprikaProvider::with_base_url(
            &config.coinpaprika_url,
            config.provider_timeout,
        )),
    ];
    let backend = OllamaBackend::new(OllamaConfig {
        base_url: config.ollama_url.clone(),
        model: config.ollama_model.clone(),
        timeout: config.ai_timeout,
    })?;
    tracing::info!(
        "Using Ollama model {} at {}",
        backend.model(),
        config.ollama_url
    );
    Ok(build_state_with(config, providers, Arc::new(backend)))
}

/// Build the application state around the given providers and backend.
pub fn build_state_with(
    config: &Config,
    providers: Vec<Arc<dyn MarketDataProvider>>,
    backend: Arc<dyn AnswerBackend>,
) -> Arc<AppState> {
    let limiter = Arc::new(RateLimiter::with_limits([
        (ResourceClass::MarketData, config.market_limit),
        (ResourceClass::Ai, config.ai_limit),
    ]));
    let registry =
        Arc::new(ProviderRegistry::new(providers).with_attempt_timeout(config.provider_timeout));
    let market = Arc::new(MarketDataService::new(
        registry,
        Arc::clone(&limiter),
        MarketDataConfig {
            ttl: config.market_ttl,
            upstream_timeout: config.upstream_timeout,
            admission_wait: config.admission_wait,
            max_entries: config.cache_max_entries,
            batch_workers: config.batch_workers,
        },
    ));
    let ai = Arc::new(AiInsightService::new(
        backend,
        Arc::clone(&market),
        AiConfig {
            answer_ttl: config.answer_ttl,
            similarity_ttl: config.similarity_ttl,
            generation_timeout: config.ai_timeout,
            max_entries: config.cache_max_entries,
            admission: Admission::Immediate,
        },
    ));

    let providers = market
        .registry()
        .providers()
        .iter()
        .map(|p| p.id)
        .collect::<Vec<_>>()
        .join(", ");
    tracing::info!("Market data providers: {}", providers);

    Arc::new(AppState {
        market,
        ai,
        limiter,
        started_at: Instant::now(),
    })
}
