use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, http::HeaderValue, routing::get, BoxError, Router};
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{config::Config, error::ApiError, main_lib::AppState};

pub mod ai;
pub mod market;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz() -> &'static str {
    "ok"
}

/// Renders middleware failures (the request deadline) as error envelopes.
fn middleware_error(deadline: Duration, err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::Timeout(deadline)
    } else {
        ApiError::Anyhow(anyhow::anyhow!("Unhandled middleware error: {}", err))
    }
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(market::router())
        .merge(ai::router());

    let deadline = config.effective_request_timeout();
    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(move |err: BoxError| async move {
            middleware_error(deadline, err)
        }))
        .timeout(deadline);

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(timeout)
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
}
