//! Security news digest — binary entrypoint.
//! Boots the Axum HTTP server and the daily refresh task.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devbriefs_news::cache::{ArticleCache, InMemoryCache, NopCache, RedisCache};
use devbriefs_news::ingest::providers::newsapi::NewsApiProvider;
use devbriefs_news::ingest::scheduler::DailyScheduler;
use devbriefs_news::ingest::{DigestPipeline, PipelineSettings};
use devbriefs_news::metrics::Metrics;
use devbriefs_news::{api, DigestConfig};

/// Compact tracing logs. `try_init` so an already-installed runtime subscriber wins.
/// Set DIGEST_LOG=0 to skip.
fn enable_tracing() {
    if std::env::var("DIGEST_LOG").ok().is_some_and(|v| v == "0") {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("devbriefs_news=info,ingest=info,scheduler=info,cache=info,api=info,warn")
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

async fn build_cache(cfg: &DigestConfig) -> Arc<dyn ArticleCache> {
    match cfg.cache.backend.as_str() {
        "redis" => match RedisCache::connect(&cfg.cache.redis_url).await {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable, falling back to in-memory cache");
                Arc::new(InMemoryCache::new())
            }
        },
        "memory" => Arc::new(InMemoryCache::new()),
        "none" => Arc::new(NopCache),
        other => {
            tracing::warn!(backend = other, "unknown cache backend, using in-memory cache");
            Arc::new(InMemoryCache::new())
        }
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_tracing();

    let cfg = DigestConfig::load()?;
    // Bad zone or time of day: refuse to start.
    let schedule = cfg.schedule().map_err(anyhow::Error::from)?;

    let provider = NewsApiProvider::new(cfg.newsapi.api_key.clone(), cfg.news_query())
        .map_err(anyhow::Error::from)?;
    let cache = build_cache(&cfg).await;

    let metrics = match Metrics::init(cfg.cache.ttl_secs) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };

    let pipeline = Arc::new(DigestPipeline::new(
        Arc::new(provider),
        cache,
        PipelineSettings {
            deadline: cfg.fetch_deadline(),
            similarity_threshold: cfg.dedup.similarity_threshold,
            ttl: cfg.cache_ttl(),
        },
    ));
    tracing::info!(
        schedule = %schedule,
        backend = pipeline.cache_backend(),
        threshold = cfg.dedup.similarity_threshold,
        deadline_ms = cfg.newsapi.fetch_deadline_ms,
        "digest service starting"
    );

    let state = api::AppState::new(Arc::clone(&pipeline));

    // --- Daily refresh loop ---
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let token = shutdown.clone();
        let final_state = DailyScheduler::new(schedule)
            .run(shutdown, move || {
                let pipeline = Arc::clone(&pipeline);
                let token = token.clone();
                async move { pipeline.refresh(&token).await }
            })
            .await;
        tracing::info!(cycles = final_state.cycles, "daily refresh loop exited");
    });

    let mut router = api::router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
