// src/ingest/mod.rs
pub mod bounded;
pub mod domains;
pub mod dedup;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cache::{self, ArticleCache, CacheWriteReport};
use crate::error::{CacheError, FetchError};
use crate::ingest::bounded::{fetch_with_deadline, DEFAULT_FETCH_DEADLINE};
use crate::ingest::dedup::{dedupe_with_stats, DEFAULT_SIMILARITY_THRESHOLD};
use crate::ingest::types::{Article, FetchOutcome, NewsSource};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_fetch_total",
            "Bounded news fetches by outcome (success|timeout|error)."
        );
        describe_histogram!("digest_fetch_ms", "Wall time of one bounded fetch in milliseconds.");
        describe_histogram!("digest_parse_ms", "Search response parse time in milliseconds.");
        describe_counter!(
            "digest_articles_kept_total",
            "Articles kept after near-duplicate removal."
        );
        describe_counter!(
            "digest_dedup_dropped_total",
            "Articles dropped as near-duplicates of an earlier title."
        );
        describe_counter!("digest_cache_writes_total", "Successful per-article cache writes.");
        describe_counter!("digest_cache_write_errors_total", "Failed cache writes.");
        describe_counter!("digest_cycle_errors_total", "Scheduled daily runs that failed.");
        describe_gauge!(
            "digest_last_refresh_ts",
            "Unix ts of the last successful digest refresh."
        );
        describe_gauge!("digest_next_run_ts", "Unix ts of the next scheduled daily run.");
    });
}

/// Knobs for one refresh cycle.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub deadline: Duration,
    pub similarity_threshold: f64,
    pub ttl: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_FETCH_DEADLINE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            ttl: cache::DEFAULT_TTL,
        }
    }
}

/// What one refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub kept: usize,
    pub dropped: usize,
    pub cache: CacheWriteReport,
}

/// Fetch -> dedupe -> cache. Shared by the daily scheduler and the HTTP handlers.
pub struct DigestPipeline {
    source: Arc<dyn NewsSource>,
    cache: Arc<dyn ArticleCache>,
    settings: PipelineSettings,
}

impl DigestPipeline {
    pub fn new(
        source: Arc<dyn NewsSource>,
        cache: Arc<dyn ArticleCache>,
        settings: PipelineSettings,
    ) -> Self {
        ensure_metrics_described();
        Self {
            source,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    /// One bounded fetch, tagged for metrics. Never touches the cache.
    pub async fn fetch(&self, parent: &CancellationToken) -> FetchOutcome {
        let source = Arc::clone(&self.source);
        let t0 = Instant::now();
        let res = fetch_with_deadline(parent, self.settings.deadline, move || async move {
            source.fetch_latest().await
        })
        .await;
        histogram!("digest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let outcome = FetchOutcome::from(res);
        counter!("digest_fetch_total", "outcome" => outcome.label()).increment(1);
        match &outcome {
            FetchOutcome::Success(v) => {
                tracing::info!(target: "ingest", source = self.source.name(), fetched = v.len(), "fetch ok")
            }
            FetchOutcome::Timeout(d) => tracing::warn!(
                target: "ingest",
                source = self.source.name(),
                deadline_ms = d.as_millis() as u64,
                "fetch timed out"
            ),
            FetchOutcome::TransportError(e) => {
                tracing::warn!(target: "ingest", source = self.source.name(), error = %e, "fetch failed")
            }
        }
        outcome
    }

    /// Full cycle. On fetch failure the cache keeps whatever the previous cycle wrote.
    pub async fn refresh(
        &self,
        parent: &CancellationToken,
    ) -> Result<(Vec<Article>, CycleReport), FetchError> {
        let fetched = self.fetch(parent).await.into_result()?;
        let fetched_len = fetched.len();

        let (kept, dropped) = dedupe_with_stats(fetched, self.settings.similarity_threshold);
        counter!("digest_articles_kept_total").increment(kept.len() as u64);
        counter!("digest_dedup_dropped_total").increment(dropped as u64);

        let cache_report = cache::store_digest(self.cache.as_ref(), &kept, self.settings.ttl).await;
        gauge!("digest_last_refresh_ts").set(chrono::Utc::now().timestamp() as f64);

        let report = CycleReport {
            fetched: fetched_len,
            kept: kept.len(),
            dropped,
            cache: cache_report,
        };
        tracing::info!(
            target: "ingest",
            fetched = report.fetched,
            kept = report.kept,
            dropped = report.dropped,
            cache_written = report.cache.written,
            cache_failed = report.cache.failed,
            backend = self.cache.backend(),
            "digest refreshed"
        );
        Ok((kept, report))
    }

    /// Latest digest as last written to the cache.
    pub async fn cached(&self) -> Result<Vec<Article>, CacheError> {
        cache::load_digest(self.cache.as_ref()).await
    }
}
