use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use cryptoinsight_ai::backend::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use cryptoinsight_market_data::provider::{coingecko, coinpaprika};
use cryptoinsight_market_data::RateLimitConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub upstream_timeout: Duration,
    pub provider_timeout: Duration,
    pub ai_timeout: Duration,
    pub admission_wait: Duration,
    pub market_ttl: Duration,
    pub answer_ttl: Duration,
    pub similarity_ttl: Duration,
    pub cache_max_entries: usize,
    pub market_limit: RateLimitConfig,
    pub ai_limit: RateLimitConfig,
    pub batch_workers: usize,
    pub cache_sweep_interval: Duration,
    /// Popular-symbol warm-up period, zero to disable.
    pub warm_interval: Duration,
    pub ollama_url: String,
    pub ollama_model: String,
    pub coingecko_url: String,
    pub coinpaprika_url: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(90_000),
            upstream_timeout: Duration::from_millis(15_000),
            provider_timeout: Duration::from_millis(5_000),
            ai_timeout: Duration::from_millis(60_000),
            admission_wait: Duration::from_millis(2_000),
            market_ttl: Duration::from_secs(60),
            answer_ttl: Duration::from_secs(1800),
            similarity_ttl: Duration::from_secs(300),
            cache_max_entries: 2000,
            market_limit: RateLimitConfig::new(30, 10),
            ai_limit: RateLimitConfig::new(20, 5),
            batch_workers: 4,
            cache_sweep_interval: Duration::from_secs(30),
            warm_interval: Duration::from_secs(120),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            coingecko_url: coingecko::DEFAULT_BASE_URL.to_string(),
            coinpaprika_url: coinpaprika::DEFAULT_BASE_URL.to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load `.env`, then read `CI_*` variables over the defaults.
    ///
    /// Unparseable numbers keep their default; an unparseable listen address
    /// is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let listen_addr = match std::env::var("CI_LISTEN_ADDR") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid CI_LISTEN_ADDR: {}", raw))?,
            Err(_) => defaults.listen_addr,
        };
        let cors_allow = std::env::var("CI_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Self {
            listen_addr,
            cors_allow,
            request_timeout: env_millis("CI_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            upstream_timeout: env_millis("CI_UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout),
            provider_timeout: env_millis("CI_PROVIDER_TIMEOUT_MS", defaults.provider_timeout),
            ai_timeout: env_millis("CI_AI_TIMEOUT_MS", defaults.ai_timeout),
            admission_wait: env_millis("CI_ADMISSION_WAIT_MS", defaults.admission_wait),
            market_ttl: env_secs("CI_MARKET_TTL_SECS", defaults.market_ttl),
            answer_ttl: env_secs("CI_ANSWER_TTL_SECS", defaults.answer_ttl),
            similarity_ttl: env_secs("CI_SIMILARITY_TTL_SECS", defaults.similarity_ttl),
            cache_max_entries: env_parse("CI_CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            market_limit: RateLimitConfig::new(
                env_parse("CI_MARKET_RPM", defaults.market_limit.requests_per_minute),
                env_parse("CI_MARKET_BURST", defaults.market_limit.burst_capacity),
            ),
            ai_limit: RateLimitConfig::new(
                env_parse("CI_AI_RPM", defaults.ai_limit.requests_per_minute),
                env_parse("CI_AI_BURST", defaults.ai_limit.burst_capacity),
            ),
            batch_workers: env_parse("CI_BATCH_WORKERS", defaults.batch_workers),
            cache_sweep_interval: env_secs("CI_CACHE_SWEEP_SECS", defaults.cache_sweep_interval),
            warm_interval: env_secs("CI_WARM_INTERVAL_SECS", defaults.warm_interval),
            ollama_url: std::env::var("CI_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: std::env::var("CI_OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            coingecko_url: std::env::var("CI_COINGECKO_URL").unwrap_or(defaults.coingecko_url),
            coinpaprika_url: std::env::var("CI_COINPAPRIKA_URL")
                .unwrap_or(defaults.coinpaprika_url),
            log_format: std::env::var("CI_LOG_FORMAT").unwrap_or(defaults.log_format),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make a bucket never refill.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.market_limit.requests_per_minute > 0,
            "CI_MARKET_RPM must be greater than zero"
        );
        anyhow::ensure!(
            self.ai_limit.requests_per_minute > 0,
            "CI_AI_RPM must be greater than zero"
        );
        Ok(())
    }

    /// Whole-request deadline. Never shorter than the slowest route: a
    /// symbol question can wait for admission, run a market fetch and then
    /// a generation.
    pub fn effective_request_timeout(&self) -> Duration {
        let slowest = self
            .admission_wait
            .saturating_add(self.upstream_timeout)
            .saturating_add(self.ai_timeout);
        self.request_timeout.max(slowest)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
