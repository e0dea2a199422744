use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::error::FetchError;
use crate::ingest::types::Article;
use crate::ingest::DigestPipeline;

pub const DIGEST_SOURCE_HEADER: &str = "x-digest-source";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DigestPipeline>,
    /// Process-wide shutdown; request fetches run under a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Arc<DigestPipeline>) -> Self {
        Self {
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/everything-hacking-news", get(everything_hacking_news))
        .route("/api/everything-hacking-news/cached", get(cached_hacking_news))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

fn digest_response(articles: Vec<Article>, source: &'static str) -> Response {
    let mut resp = Json(articles).into_response();
    resp.headers_mut().insert(
        HeaderName::from_static(DIGEST_SOURCE_HEADER),
        HeaderValue::from_static(source),
    );
    resp
}

/// Fresh fetch under the request; the cached digest answers when the fetch fails.
async fn everything_hacking_news(State(state): State<AppState>) -> Response {
    let err = match state.pipeline.refresh(&state.shutdown).await {
        Ok((articles, _report)) => return digest_response(articles, "fresh"),
        Err(e) => e,
    };

    match state.pipeline.cached().await {
        Ok(articles) if !articles.is_empty() => {
            tracing::info!(target: "api", error = %err, served = articles.len(), "serving cached digest");
            digest_response(articles, "cache")
        }
        Ok(_) => fetch_failure(&err),
        Err(cache_err) => {
            tracing::warn!(target: "api", error = %cache_err, "cache fallback failed");
            fetch_failure(&err)
        }
    }
}

fn fetch_failure(err: &FetchError) -> Response {
    let status = if err.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    error_response(status, err.to_string())
}

async fn cached_hacking_news(State(state): State<AppState>) -> Response {
    match state.pipeline.cached().await {
        Ok(articles) => digest_response(articles, "cache"),
        Err(e) => {
            tracing::warn!(target: "api", error = %e, "cache read failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}
