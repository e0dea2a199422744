// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/everything-hacking-news (fresh, cache fallback, 504/502 with empty cache)
// - GET /api/everything-hacking-news/cached

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use http::header::CONTENT_TYPE;
use serde_json::Value as Json;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as _; // for `oneshot`

use devbriefs_news::api::{self, AppState, DIGEST_SOURCE_HEADER};
use devbriefs_news::cache::{ArticleCache, InMemoryCache};
use devbriefs_news::ingest::providers::newsapi::NewsApiProvider;
use devbriefs_news::ingest::{DigestPipeline, PipelineSettings};
use devbriefs_news::{Article, FetchError, NewsSource};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const FIXTURE: &str = include_str!("fixtures/newsapi_everything.json");

struct Hanging;

#[async_trait]
impl NewsSource for Hanging {
    async fn fetch_latest(&self) -> Result<Vec<Article>, FetchError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
    fn name(&self) -> &'static str {
        "hanging"
    }
}

struct Unavailable;

#[async_trait]
impl NewsSource for Unavailable {
    async fn fetch_latest(&self) -> Result<Vec<Article>, FetchError> {
        Err(FetchError::Status(503))
    }
    fn name(&self) -> &'static str {
        "unavailable"
    }
}

fn pipeline(source: Arc<dyn NewsSource>, cache: Arc<dyn ArticleCache>) -> Arc<DigestPipeline> {
    Arc::new(DigestPipeline::new(
        source,
        cache,
        PipelineSettings {
            deadline: Duration::from_millis(50),
            ..Default::default()
        },
    ))
}

fn test_router(source: Arc<dyn NewsSource>, cache: Arc<dyn ArticleCache>) -> Router {
    api::router(AppState::new(pipeline(source, cache)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let source = resp
        .headers()
        .get(DIGEST_SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, source, bytes)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(Arc::new(Unavailable), Arc::new(InMemoryCache::new()));
    let (status, _, bytes) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK, "health should be 200");
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn fresh_digest_is_deduped_json_array() {
    let app = test_router(
        Arc::new(NewsApiProvider::from_fixture_str(FIXTURE)),
        Arc::new(InMemoryCache::new()),
    );

    let resp = app
        .clone()
        .oneshot(
            Request::get("/api/everything-hacking-news")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "application/json",
        "digest is served as JSON"
    );

    let (status, source, bytes) = get(app, "/api/everything-hacking-news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("fresh"));

    let v: Json = serde_json::from_slice(&bytes).expect("parse digest json");
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 4);
    // wire shape matches the upstream article objects
    assert!(arr[0].get("publishedAt").is_some());
    assert_eq!(arr[0]["source"]["name"], "BleepingComputer");
}

#[tokio::test]
async fn timeout_falls_back_to_previous_digest() {
    let cache: Arc<dyn ArticleCache> = Arc::new(InMemoryCache::new());

    // seed the cache with one successful cycle
    pipeline(Arc::new(NewsApiProvider::from_fixture_str(FIXTURE)), cache.clone())
        .refresh(&CancellationToken::new())
        .await
        .expect("seed refresh");

    let app = test_router(Arc::new(Hanging), cache);
    let (status, source, bytes) = get(app, "/api/everything-hacking-news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("cache"));
    let v: Vec<Article> = serde_json::from_slice(&bytes).expect("articles");
    assert_eq!(v.len(), 4);
}

#[tokio::test]
async fn timeout_with_empty_cache_is_504() {
    let app = test_router(Arc::new(Hanging), Arc::new(InMemoryCache::new()));
    let (status, source, bytes) = get(app, "/api/everything-hacking-news").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(source.is_none());
    let v: Json = serde_json::from_slice(&bytes).expect("error json");
    assert_eq!(v["error"], "news fetch timed out after 50 milliseconds");
}

#[tokio::test]
async fn upstream_failure_with_empty_cache_is_502() {
    let app = test_router(Arc::new(Unavailable), Arc::new(InMemoryCache::new()));
    let (status, _, bytes) = get(app, "/api/everything-hacking-news").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let v: Json = serde_json::from_slice(&bytes).expect("error json");
    assert!(v["error"].as_str().unwrap_or_default().contains("503"));
}

#[tokio::test]
async fn cached_endpoint_never_fetches() {
    let cache: Arc<dyn ArticleCache> = Arc::new(InMemoryCache::new());

    let (status, source, bytes) = get(
        test_router(Arc::new(Hanging), cache.clone()),
        "/api/everything-hacking-news/cached",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.as_deref(), Some("cache"));
    assert_eq!(bytes, b"[]");

    pipeline(Arc::new(NewsApiProvider::from_fixture_str(FIXTURE)), cache.clone())
        .refresh(&CancellationToken::new())
        .await
        .expect("refresh");

    let (_, _, bytes) = get(
        test_router(Arc::new(Hanging), cache),
        "/api/everything-hacking-news/cached",
    )
    .await;
    let v: Vec<Article> = serde_json::from_slice(&bytes).expect("articles");
    assert_eq!(v[0].title, "Hackers breach regional bank, steal customer records");
}
