use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::news::{NewsRecord, NewsStats};
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(list_news))
        .route("/api/news/refresh", post(refresh_news))
        .route("/api/news/stats", get(news_stats))
        .route("/api/ai/analyze", post(analyze))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn list_news(State(state): State<AppState>) -> Json<Vec<NewsRecord>> {
    Json(state.pipeline.list_news().await)
}

async fn refresh_news(State(state): State<AppState>) -> Json<Vec<NewsRecord>> {
    Json(state.pipeline.collect_and_enrich_all().await)
}

async fn news_stats(State(state): State<AppState>) -> Json<NewsStats> {
    Json(state.pipeline.stats())
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeReq {
    #[serde(default)]
    news_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    force: bool,
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: &'static str,
}

async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeReq>) -> Response {
    if body.news_id.trim().is_empty() || body.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "newsId and content are required",
            }),
        )
            .into_response();
    }

    let (result, outcome) = state
        .pipeline
        .analyze_one_with_outcome(body.news_id.trim(), &body.content, body.force)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(
        "X-AI-Cache",
        HeaderValue::from_static(if outcome.is_cache_hit() { "HIT" } else { "MISS" }),
    );
    headers.insert("X-AI-Source", HeaderValue::from_static(outcome.source_label()));
    (headers, Json(result)).into_response()
}
