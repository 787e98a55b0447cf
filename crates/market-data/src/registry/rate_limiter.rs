//! Token bucket admission control per upstream resource class.
//!
//! Market data providers and the AI backend have independent quotas, so each
//! [`ResourceClass`] owns its own bucket. A bucket starts full; its capacity is
//! the burst size and it refills continuously at `requests_per_minute / 60`
//! tokens per second. Admission and refill happen under one lock, so the
//! number of admitted calls in any window never exceeds what the bucket held.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Default market data quota: 30 requests per minute.
const DEFAULT_MARKET_RPM: u32 = 30;
const DEFAULT_MARKET_BURST: u32 = 10;

/// Default AI quota: 20 requests per minute.
const DEFAULT_AI_RPM: u32 = 20;
const DEFAULT_AI_BURST: u32 = 5;

/// An upstream with its own quota.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum ResourceClass {
    #[serde(rename = "MARKET_DATA")]
    MarketData,
    #[serde(rename = "AI")]
    Ai,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 2] = [ResourceClass::MarketData, ResourceClass::Ai];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketData => "MARKET_DATA",
            Self::Ai => "AI",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission was denied for a resource class.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{resource} rate limit exceeded, retry in {retry_after:?}")]
pub struct Throttled {
    pub resource: ResourceClass,
    /// Time until the bucket holds a whole token again.
    pub retry_after: Duration,
}

/// Quota for one resource class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Sustained refill rate.
    pub requests_per_minute: u32,
    /// Bucket capacity, i.e. how many calls may be made back to back.
    pub burst_capacity: u32,
}

impl RateLimitConfig {
    pub fn new(requests_per_minute: u32, burst_capacity: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity,
        }
    }

    /// Built-in quota for a class.
    pub fn default_for(class: ResourceClass) -> Self {
        match class {
            ResourceClass::MarketData => Self::new(DEFAULT_MARKET_RPM, DEFAULT_MARKET_BURST),
            ResourceClass::Ai => Self::new(DEFAULT_AI_RPM, DEFAULT_AI_BURST),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn new(config: RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst_capacity.max(1));
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(config.requests_per_minute) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until one token is available. Callers refill first.
    fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else if self.rate <= 0.0 {
            Duration::MAX
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Token bucket rate limiter keyed by [`ResourceClass`].
///
/// Constructed once at startup and shared by the market data and AI
/// services.
pub struct RateLimiter {
    buckets: Mutex<HashMap<ResourceClass, TokenBucket>>,
}

impl RateLimiter {
    /// Create a limiter with the built-in quota for every class.
    pub fn new() -> Self {
        Self::with_limits(
            ResourceClass::ALL.map(|class| (class, RateLimitConfig::default_for(class))),
        )
    }

    /// Create a limiter with explicit quotas. Classes not listed use their
    /// built-in quota.
    pub fn with_limits(limits: impl IntoIterator<Item = (ResourceClass, RateLimitConfig)>) -> Self {
        let mut buckets: HashMap<ResourceClass, TokenBucket> = ResourceClass::ALL
            .iter()
            .map(|class| (*class, TokenBucket::new(RateLimitConfig::default_for(*class))))
            .collect();
        for (class, config) in limits {
            buckets.insert(class, TokenBucket::new(config));
        }
        Self {
            buckets: Mutex::new(buckets),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// A poisoned bucket can at worst admit one call too many or too few,
    /// which beats taking the whole service down.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<ResourceClass, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Replace the quota for a class. The bucket starts full.
    pub fn configure(&self, class: ResourceClass, config: RateLimitConfig) {
        self.lock_buckets().insert(class, TokenBucket::new(config));
    }

    /// Non-blocking admission. Returns `true` if a token was taken.
    pub fn admit(&self, class: ResourceClass) -> bool {
        self.check(class).is_ok()
    }

    /// Non-blocking admission that reports how long to back off on denial.
    pub fn check(&self, class: ResourceClass) -> Result<(), Throttled> {
        let mut buckets = self.lock_buckets();
        let bucket = buckets
            .entry(class)
            .or_insert_with(|| TokenBucket::new(RateLimitConfig::default_for(class)));

        if bucket.try_take() {
            debug!("Rate limiter: admitted {}", class);
            Ok(())
        } else {
            let retry_after = bucket.time_until_available();
            debug!("Rate limiter: denied {} (retry in {:?})", class, retry_after);
            Err(Throttled {
                resource: class,
                retry_after,
            })
        }
    }

    /// Wait for admission, giving up once `timeout` would be exceeded.
    ///
    /// Fails immediately when the next token cannot arrive before the
    /// deadline instead of sleeping through it.
    pub async fn wait(&self, class: ResourceClass, timeout: Duration) -> Result<(), Throttled> {
        let start = Instant::now();
        loop {
            let denied = match self.check(class) {
                Ok(()) => return Ok(()),
                Err(denied) => denied,
            };

            let waited = start.elapsed();
            let fits = waited
                .checked_add(denied.retry_after)
                .is_some_and(|total| total <= timeout);
            if !fits {
                return Err(denied);
            }

            debug!("Rate limiter: waiting {:?} for {}", denied.retry_after, class);
            // Another waiter may take the token first; loop and re-check.
            tokio::time::sleep(denied.retry_after.max(Duration::from_millis(1))).await;
        }
    }

    /// Tokens currently in the bucket for a class.
    pub fn remaining_tokens(&self, class: ResourceClass) -> f64 {
        let mut buckets = self.lock_buckets();
        match buckets.get_mut(&class) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => f64::from(RateLimitConfig::default_for(class).burst_capacity),
        }
    }

    /// Refill a class's bucket to capacity.
    pub fn reset(&self, class: ResourceClass) {
        let mut buckets = self.lock_buckets();
        if let Some(bucket) = buckets.get_mut(&class) {
            bucket.tokens = bucket.capacity;
            bucket.last_update = Instant::now();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
