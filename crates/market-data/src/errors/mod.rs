//! Error types and classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: the error enum for every market data operation
//! - [`ErrorKind`]: the coarse failure class surfaced to API callers
//! - [`RetryClass`]: how the provider registry reacts to a provider failure

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::coalescer::FlightError;
use crate::registry::Throttled;

/// Coarse failure class shared by every layer of the service.
///
/// The HTTP boundary maps each kind onto a status code; library code only
/// needs to pick the right variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Rejected by a local rate limiter.
    Throttled,
    /// The upstream provider failed or timed out.
    UpstreamUnavailable,
    /// The requested symbol is unknown.
    NotFound,
    /// The request was malformed.
    InvalidRequest,
    /// Anything unexpected.
    Internal,
}

/// Errors that can occur during market data operations.
///
/// The type is `Clone` because a single coalesced fetch fans its outcome out
/// to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol is empty or contains characters no provider accepts.
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// A local token bucket denied admission.
    #[error("Throttled: {resource} quota exhausted, retry in {retry_after_ms}ms")]
    Throttled {
        /// Resource class whose bucket is empty
        resource: String,
        /// Estimated wait until a token is available
        retry_after_ms: u64,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider (or fetch) that timed out
        provider: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The circuit breaker is open for this provider.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// No providers are registered or all circuits are open.
    #[error("No providers available")]
    NoProvidersAvailable,

    /// All providers were tried and all failed.
    #[error("All providers failed")]
    AllProvidersFailed,

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use cryptoinsight_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    ///
    /// let error = MarketDataError::SymbolNotFound("NOPE".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::SymbolNotFound(_) | Self::InvalidSymbol(_) | Self::Throttled { .. } => {
                RetryClass::Never
            }

            Self::RateLimited { .. } | Self::Timeout { .. } => RetryClass::FailoverWithPenalty,

            Self::ProviderError { .. } => RetryClass::NextProvider,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::NoProvidersAvailable | Self::AllProvidersFailed | Self::Internal(_) => {
                RetryClass::Never
            }
        }
    }

    /// Returns the failure class reported to API callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SymbolNotFound(_) => ErrorKind::NotFound,
            Self::InvalidSymbol(_) => ErrorKind::InvalidRequest,
            Self::Throttled { .. } => ErrorKind::Throttled,
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::CircuitOpen { .. }
            | Self::NoProvidersAvailable
            | Self::AllProvidersFailed => ErrorKind::UpstreamUnavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Suggested delay before retrying, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after_ms, .. } => Some(Duration::from_millis(*retry_after_ms)),
            _ => None,
        }
    }
}

impl From<Throttled> for MarketDataError {
    fn from(t: Throttled) -> Self {
        Self::Throttled {
            resource: t.resource.to_string(),
            retry_after_ms: u64::try_from(t.retry_after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<FlightError> for MarketDataError {
    fn from(e: FlightError) -> Self {
        match e {
            FlightError::TimedOut(_) => Self::Timeout {
                provider: "upstream".to_string(),
            },
            FlightError::Abandoned => {
                Self::Internal("in-flight fetch ended without a result".to_string())
            }
        }
    }
}
