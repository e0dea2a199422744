// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::cache::{ArticleCache, InMemoryCache, NopCache, RedisCache};
pub use crate::config::DigestConfig;
pub use crate::error::{CacheError, DomainError, FetchError, ScheduleError};
pub use crate::ingest::dedup::{dedupe, similarity};
pub use crate::ingest::scheduler::{duration_until_next, DailySchedule, DailyScheduler};
pub use crate::ingest::types::{Article, FetchOutcome, NewsSource};
pub use crate::ingest::{CycleReport, DigestPipeline, PipelineSettings};
