// src/config/digest.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::ingest::dedup::DEFAULT_SIMILARITY_THRESHOLD;
use crate::ingest::domains::{default_domains, normalize_domains};
use crate::ingest::providers::newsapi::{NewsQuery, DEFAULT_ENDPOINT, HACKING_QUERY};
use crate::ingest::scheduler::DailySchedule;

pub const DEFAULT_DIGEST_CONFIG_PATH: &str = "config/digest.toml";

pub const ENV_DIGEST_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_API_KEY: &str = "NEWSFETCHER_GOOGLE_API_KEY";
pub const ENV_SIMILARITY_THRESHOLD: &str = "DIGEST_SIMILARITY_THRESHOLD";
pub const ENV_FETCH_DEADLINE_MS: &str = "DIGEST_FETCH_DEADLINE_MS";
pub const ENV_SCHEDULE_TZ: &str = "DIGEST_SCHEDULE_TZ";
pub const ENV_CACHE_BACKEND: &str = "DIGEST_CACHE_BACKEND";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
/// Comma separated; replaces `[newsapi] domains` entirely.
pub const ENV_NEWS_DOMAINS: &str = "NEWS_DOMAINS";

fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_query() -> String {
    HACKING_QUERY.to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_sort_by() -> String {
    "publishedAt".to_string()
}
fn default_page_size() -> u32 {
    10
}
fn default_lookback_days() -> i64 {
    7
}
fn default_deadline_ms() -> u64 {
    500
}
fn default_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_hour() -> u32 {
    6
}
fn default_backend() -> String {
    "redis".to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_ttl_secs() -> u64 {
    24 * 3600
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub newsapi: NewsApiSection,
    #[serde(default)]
    pub dedup: DedupSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsApiSection {
    /// "ENV" means: read from NEWSFETCHER_GOOGLE_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_deadline_ms")]
    pub fetch_deadline_ms: u64,
    /// Root domains only; NewsAPI matches their subdomains itself.
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

impl Default for NewsApiSection {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            endpoint: default_endpoint(),
            query: default_query(),
            language: default_language(),
            sort_by: default_sort_by(),
            page_size: default_page_size(),
            lookback_days: default_lookback_days(),
            fetch_deadline_ms: default_deadline_ms(),
            domains: default_domains(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSection {
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSection {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            hour: default_hour(),
            minute: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// "redis" | "memory" | "none"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: default_redis_url(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl DigestConfig {
    /// Load using $DIGEST_CONFIG_PATH or `config/digest.toml`; a missing file means defaults.
    /// Env overrides are applied afterwards, then the api key is resolved.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_DIGEST_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DIGEST_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no digest config file, using defaults");
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.validate_domains()?;
        cfg.resolve_api_key()?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read digest config at {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("Invalid digest config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: DigestConfig = toml::from_str(s)?;
        cfg.validate_domains()?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_threshold_env(env::var(ENV_SIMILARITY_THRESHOLD).ok()) {
            self.dedup.similarity_threshold = t;
        }
        if let Some(ms) = env::var(ENV_FETCH_DEADLINE_MS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.newsapi.fetch_deadline_ms = ms;
        }
        if let Ok(tz) = env::var(ENV_SCHEDULE_TZ) {
            if !tz.trim().is_empty() {
                self.schedule.timezone = tz.trim().to_string();
            }
        }
        if let Ok(b) = env::var(ENV_CACHE_BACKEND) {
            self.cache.backend = b.trim().to_ascii_lowercase();
        }
        if let Ok(u) = env::var(ENV_REDIS_URL) {
            self.cache.redis_url = u;
        }
        if let Ok(d) = env::var(ENV_NEWS_DOMAINS) {
            if !d.trim().is_empty() {
                self.newsapi.domains = d.split(',').map(str::to_string).collect();
            }
        }
    }

    /// Lowercase and dedupe the allow-list; a URL or subdomain entry is an error.
    pub fn validate_domains(&mut self) -> anyhow::Result<()> {
        self.newsapi.domains =
            normalize_domains(&self.newsapi.domains).context("invalid [newsapi].domains")?;
        Ok(())
    }

    /// Replace the "ENV" placeholder with the real key. A missing key is a startup error.
    pub fn resolve_api_key(&mut self) -> anyhow::Result<()> {
        if self.newsapi.api_key.trim().eq_ignore_ascii_case("env") {
            self.newsapi.api_key = env::var(ENV_API_KEY)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "environment variable {ENV_API_KEY} is required but not set"
                    )
                })?;
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        let t = self.dedup.similarity_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            self.dedup.similarity_threshold = default_threshold();
        }
        if self.newsapi.fetch_deadline_ms == 0 {
            self.newsapi.fetch_deadline_ms = default_deadline_ms();
        }
        if self.newsapi.page_size == 0 {
            self.newsapi.page_size = default_page_size();
        }
        self.cache.backend = self.cache.backend.to_ascii_lowercase();
    }

    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_millis(self.newsapi.fetch_deadline_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Validated schedule; a bad zone name or time halts startup.
    pub fn schedule(&self) -> Result<DailySchedule, crate::error::ScheduleError> {
        DailySchedule::new(
            &self.schedule.timezone,
            self.schedule.hour,
            self.schedule.minute,
        )
    }

    pub fn news_query(&self) -> NewsQuery {
        NewsQuery {
            endpoint: self.newsapi.endpoint.clone(),
            query: self.newsapi.query.clone(),
            language: self.newsapi.language.clone(),
            sort_by: self.newsapi.sort_by.clone(),
            domains: self.newsapi.domains.clone(),
            page_size: self.newsapi.page_size,
            lookback_days: self.newsapi.lookback_days,
        }
    }
}
