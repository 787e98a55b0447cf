use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use cryptoinsight_ai::{
    AiHealth, Comparison, QuestionAnswer, Recommendation, RecommendationRequest,
    SimilarOptions, SimilarResponse,
};

use crate::{
    error::ApiResult,
    main_lib::AppState,
    models::{ApiResponse, CompareBody, QuestionBody, QuestionQuery, SimilarQuery},
};

async fn ask_symbol_get(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    query: Result<Query<QuestionQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<QuestionAnswer>>> {
    let Query(query) = query?;
    let question = query.question.unwrap_or_default();
    let answer = state.ai.answer_symbol_question(&symbol, &question).await?;
    Ok(Json(ApiResponse::ok(answer)))
}

async fn ask_symbol_post(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    body: Result<Json<QuestionBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<QuestionAnswer>>> {
    let Json(body) = body?;
    let question = body.question.unwrap_or_default();
    let answer = state.ai.answer_symbol_question(&symbol, &question).await?;
    Ok(Json(ApiResponse::ok(answer)))
}

async fn ask_general(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QuestionBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<QuestionAnswer>>> {
    let Json(body) = body?;
    let question = body.question.unwrap_or_default();
    let answer = state.ai.answer_general_question(&question).await?;
    Ok(Json(ApiResponse::ok(answer)))
}

async fn similar(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    query: Result<Query<SimilarQuery>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<SimilarResponse>>> {
    let Query(query) = query?;
    let defaults = SimilarOptions::default();
    let options = SimilarOptions {
        limit: query.limit.unwrap_or(defaults.limit),
        include_analysis: query.include_analysis.unwrap_or(defaults.include_analysis),
        include_market_data: query
            .include_market_data
            .unwrap_or(defaults.include_market_data),
    };
    let response = state.ai.similar(&symbol, options).await?;
    Ok(Json(ApiResponse::ok(response)))
}

async fn compare(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CompareBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Comparison>>> {
    let Json(body) = body?;
    let comparison = state.ai.compare(&body.symbols).await?;
    Ok(Json(ApiResponse::ok(comparison)))
}

async fn recommend(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RecommendationRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Recommendation>>> {
    let Json(request) = body?;
    let recommendation = state.ai.recommend(&request)?;
    Ok(Json(ApiResponse::ok(recommendation)))
}

async fn ai_health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<AiHealth>> {
    Json(ApiResponse::ok(state.ai.health()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ai/crypto/question", post(ask_general))
        .route(
            "/ai/crypto/question/{symbol}",
            get(ask_symbol_get).post(ask_symbol_post),
        )
        .route("/ai/crypto/similar/{symbol}", get(similar))
        .route("/ai/crypto/compare", post(compare))
        .route("/ai/crypto/recommend", post(recommend))
        .route("/ai/health", get(ai_health))
}
