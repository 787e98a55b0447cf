//! AI subsystem error types.

use cryptoinsight_market_data::{ErrorKind, FlightError, MarketDataError, Throttled};
use thiserror::Error;

/// AI subsystem errors.
///
/// `Clone` so that one coalesced generation can hand the same outcome to
/// every waiter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    /// Invalid input or request.
    #[error("{0}")]
    InvalidInput(String),

    /// The symbol is not in the coin catalog.
    #[error("Unknown cryptocurrency: {0}")]
    UnknownSymbol(String),

    /// The AI token bucket is empty.
    #[error("Throttled: {resource} quota exhausted, retry in {retry_after_ms}ms")]
    Throttled {
        resource: String,
        retry_after_ms: u64,
    },

    /// The text-generation backend failed.
    #[error("Backend error: {backend} - {message}")]
    Backend { backend: String, message: String },

    /// The text-generation backend did not answer in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Market data needed for the answer could not be loaded.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AiError {
    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new backend error.
    pub fn backend(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Failure class reported to API callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AiError::InvalidInput(_) => ErrorKind::InvalidRequest,
            AiError::UnknownSymbol(_) => ErrorKind::NotFound,
            AiError::Throttled { .. } => ErrorKind::Throttled,
            AiError::Backend { .. } | AiError::Timeout(_) => ErrorKind::UpstreamUnavailable,
            AiError::MarketData(e) => e.kind(),
            AiError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Suggested wait before retrying a throttled request, in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            AiError::Throttled { retry_after_ms, .. } => Some(*retry_after_ms),
            AiError::MarketData(MarketDataError::Throttled { retry_after_ms, .. }) => {
                Some(*retry_after_ms)
            }
            _ => None,
        }
    }
}

/// Error code for programmatic handling by clients.
impl AiError {
    pub fn code(&self) -> &'static str {
        match self {
            AiError::InvalidInput(_) => "INVALID_INPUT",
            AiError::UnknownSymbol(_) => "UNKNOWN_SYMBOL",
            AiError::Throttled { .. } => "THROTTLED",
            AiError::Backend { .. } => "BACKEND_ERROR",
            AiError::Timeout(_) => "BACKEND_TIMEOUT",
            AiError::MarketData(_) => "MARKET_DATA_ERROR",
            AiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<Throttled> for AiError {
    fn from(t: Throttled) -> Self {
        AiError::Throttled {
            resource: t.resource.to_string(),
            retry_after_ms: u64::try_from(t.retry_after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<FlightError> for AiError {
    fn from(e: FlightError) -> Self {
        match e {
            FlightError::TimedOut(after) => {
                AiError::Timeout(format!("answer generation exceeded {:?}", after))
            }
            FlightError::Abandoned => AiError::internal(e.to_string()),
        }
    }
}
