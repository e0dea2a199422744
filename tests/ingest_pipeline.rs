// tests/ingest_pipeline.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use devbriefs_news::cache::{load_digest, ArticleCache, InMemoryCache, DIGEST_INDEX_KEY};
use devbriefs_news::ingest::providers::newsapi::NewsApiProvider;
use devbriefs_news::ingest::types::{Article, FetchOutcome, NewsSource};
use devbriefs_news::ingest::{DigestPipeline, PipelineSettings};
use devbriefs_news::FetchError;

const FIXTURE: &str = include_str!("fixtures/newsapi_everything.json");

/// Answers after `delay`; used to push the fetch past its deadline.
struct Slow {
    delay: Duration,
}

#[async_trait]
impl NewsSource for Slow {
    async fn fetch_latest(&self) -> Result<Vec<Article>, FetchError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![Article {
            title: "too late".into(),
            ..Default::default()
        }])
    }
    fn name(&self) -> &'static str {
        "slow"
    }
}

fn settings(deadline_ms: u64) -> PipelineSettings {
    PipelineSettings {
        deadline: Duration::from_millis(deadline_ms),
        ..Default::default()
    }
}

#[tokio::test]
async fn fixture_cycle_fetches_dedupes_and_caches() {
    let cache = Arc::new(InMemoryCache::new());
    let pipeline = DigestPipeline::new(
        Arc::new(NewsApiProvider::from_fixture_str(FIXTURE)),
        cache.clone(),
        settings(500),
    );

    let (kept, report) = pipeline.refresh(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.fetched, 5);
    assert_eq!(report.kept, 4);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.cache.written, 4);
    assert_eq!(report.cache.failed, 0);

    assert!(cache.get(DIGEST_INDEX_KEY).await.unwrap().is_some());
    let cached = load_digest(cache.as_ref()).await.unwrap();
    assert_eq!(cached, kept, "cache preserves digest order");
}

#[tokio::test]
async fn slow_source_times_out_and_cache_is_untouched() {
    let cache = Arc::new(InMemoryCache::new());
    let pipeline = DigestPipeline::new(
        Arc::new(Slow {
            delay: Duration::from_secs(5),
        }),
        cache.clone(),
        settings(50),
    );

    let started = std::time::Instant::now();
    let outcome = pipeline.fetch(&CancellationToken::new()).await;
    assert_eq!(outcome.label(), "timeout");
    assert!(matches!(outcome, FetchOutcome::Timeout(d) if d == Duration::from_millis(50)));
    assert!(started.elapsed() < Duration::from_millis(1_000));

    let err = pipeline.refresh(&CancellationToken::new()).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "news fetch timed out after 50 milliseconds");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn cancelled_parent_ends_fetch_early() {
    let pipeline = DigestPipeline::new(
        Arc::new(Slow {
            delay: Duration::from_secs(5),
        }),
        Arc::new(InMemoryCache::new()),
        settings(10_000),
    );
    let parent = CancellationToken::new();
    parent.cancel();

    let started = std::time::Instant::now();
    let err = pipeline.refresh(&parent).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn api_error_body_is_a_transport_outcome() {
    let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;
    let pipeline = DigestPipeline::new(
        Arc::new(NewsApiProvider::from_fixture_str(body)),
        Arc::new(InMemoryCache::new()),
        settings(500),
    );
    let outcome = pipeline.fetch(&CancellationToken::new()).await;
    assert_eq!(outcome.label(), "error");
    match outcome.into_result() {
        Err(FetchError::Api { code, .. }) => assert_eq!(code, "apiKeyInvalid"),
        other => panic!("expected api error, got {other:?}"),
    }
}
