#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use cryptoinsight_ai::{AiError, AnswerBackend};
use cryptoinsight_market_data::{MarketDataError, MarketDataProvider, MarketSnapshot};
use cryptoinsight_server::{api::app_router, build_state_with, config::Config, AppState};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

/// Serves a fixed price for every symbol except `NOPE` (unknown) and
/// `DOWN` (provider failure).
#[derive(Default)]
pub struct FakeProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn id(&self) -> &'static str {
        "FAKE"
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match symbol {
            "NOPE" => Err(MarketDataError::SymbolNotFound(symbol.to_string())),
            "DOWN" => Err(MarketDataError::ProviderError {
                provider: "FAKE".to_string(),
                message: "HTTP 503".to_string(),
            }),
            _ => Ok(MarketSnapshot::new(symbol, symbol, dec!(100), "FAKE")),
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay_ms: AtomicU64,
}

#[async_trait]
impl AnswerBackend for FakeBackend {
    fn id(&self) -> &'static str {
        "FAKE"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, AiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AiError::backend("FAKE", "model not loaded"));
        }
        Ok(format!("generated answer {}", n))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub provider: Arc<FakeProvider>,
    pub backend: Arc<FakeBackend>,
}

pub fn test_app() -> TestApp {
    test_app_with(Config::default())
}

pub fn test_app_with(config: Config) -> TestApp {
    let provider = Arc::new(FakeProvider::default());
    let backend = Arc::new(FakeBackend::default());
    let state = build_state_with(
        &config,
        vec![provider.clone() as Arc<dyn MarketDataProvider>],
        backend.clone(),
    );
    TestApp {
        router: app_router(state.clone(), &config),
        state,
        provider,
        backend,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<String>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        let request = request
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        TestResponse {
            status,
            headers,
            body,
        }
    }
}
