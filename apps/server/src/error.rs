use std::time::Duration;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use cryptoinsight_ai::AiError;
use cryptoinsight_market_data::{ErrorKind, MarketDataError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MarketData(#[from] MarketDataError),
    #[error("{0}")]
    Ai(#[from] AiError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    /// Always null; keeps the envelope shape of successful responses.
    data: Option<()>,
    message: String,
    code: &'static str,
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
    timestamp: DateTime<Utc>,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::MarketData(e) => e.kind(),
            ApiError::Ai(e) => e.kind(),
            ApiError::BadRequest(_) => ErrorKind::InvalidRequest,
            ApiError::Timeout(_) => ErrorKind::UpstreamUnavailable,
            ApiError::Anyhow(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::MarketData(e) => match e.kind() {
                ErrorKind::Throttled => "THROTTLED",
                ErrorKind::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
                ErrorKind::NotFound => "SYMBOL_NOT_FOUND",
                ErrorKind::InvalidRequest => "INVALID_SYMBOL",
                ErrorKind::Internal => "INTERNAL_ERROR",
            },
            ApiError::Ai(e) => e.code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Timeout(_) => "REQUEST_TIMEOUT",
            ApiError::Anyhow(_) => "INTERNAL_ERROR",
        }
    }

    fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ApiError::MarketData(e) => e
                .retry_after()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            ApiError::Ai(e) => e.retry_after_ms(),
            _ => None,
        }
    }
}

/// HTTP status for an error kind.
///
/// An unknown symbol is a domain-level outcome, reported as 200 with
/// `success: false`.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::NotFound => StatusCode::OK,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        let retry_after_ms = self.retry_after_ms();
        match kind {
            ErrorKind::Internal | ErrorKind::UpstreamUnavailable => {
                tracing::warn!(status = status.as_u16(), "Request failed: {}", self)
            }
            _ => tracing::debug!(status = status.as_u16(), "Request rejected: {}", self),
        }

        let body = Json(ErrorBody {
            success: false,
            data: None,
            message: self.to_string(),
            code: self.code(),
            kind,
            retry_after_ms,
            timestamp: Utc::now(),
        });
        let mut response = (status, body).into_response();
        if let Some(ms) = retry_after_ms.filter(|_| status == StatusCode::TOO_MANY_REQUESTS) {
            // Retry-After is in whole seconds, rounded up.
            let secs = ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let retry = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, retry, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_throttled_sets_retry_after() {
        let err = ApiError::from(MarketDataError::Throttled {
            resource: "MARKET_DATA".to_string(),
            retry_after_ms: 1500,
        });
        let (status, retry, body) = render(err).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(retry.as_deref(), Some("2"));
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "THROTTLED");
        assert_eq!(body["retryAfterMs"], 1500);
    }

    #[tokio::test]
    async fn test_not_found_is_domain_failure() {
        let (status, retry, body) =
            render(MarketDataError::SymbolNotFound("NOPE".into()).into()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(retry.is_none());
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_some_and(|d| d.is_null()));
        assert_eq!(body["code"], "SYMBOL_NOT_FOUND");
        assert_eq!(body["message"], "Symbol not found: NOPE");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(
            render(MarketDataError::AllProvidersFailed.into()).await.0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            render(AiError::invalid_input("Question is required").into())
                .await
                .0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            render(ApiError::Timeout(Duration::from_secs(90))).await.0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            render(ApiError::Anyhow(anyhow::anyhow!("boom"))).await.0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
