// src/cache/mod.rs
//! Article cache: fingerprinted key/value store with expiry.
//!
//! The pipeline writes one entry per kept article (key = title fingerprint) plus an
//! index entry listing the fingerprints of the latest digest, so the serving path can
//! rebuild the digest without scanning the backend.

pub mod memory;
pub mod redis_cache;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::ingest::types::Article;

pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;

/// Entries expire one day after the cycle that wrote them.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Key holding the ordered fingerprints of the most recent digest.
pub const DIGEST_INDEX_KEY: &str = "digest:latest";

/// SHA-256 of an article title, lowercase hex. Identical titles share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_title(title: &str) -> Self {
        let digest = Sha256::digest(title.as_bytes());
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        Fingerprint(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ArticleCache: Send + Sync {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    /// `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
    fn backend(&self) -> &'static str;
}

/// Accepts every write, never returns anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopCache;

#[async_trait]
impl ArticleCache for NopCache {
    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }
    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
    fn backend(&self) -> &'static str {
        "nop"
    }
}

/// Per-cycle write tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheWriteReport {
    pub written: usize,
    pub failed: usize,
}

/// Write every article under its fingerprint, then the digest index.
/// Failures are logged per key and never stop the remaining writes.
pub async fn store_digest(
    cache: &dyn ArticleCache,
    articles: &[Article],
    ttl: Duration,
) -> CacheWriteReport {
    let mut report = CacheWriteReport::default();
    let mut index: Vec<Fingerprint> = Vec::with_capacity(articles.len());

    for article in articles {
        let key = Fingerprint::of_title(&article.title);
        let res = match serde_json::to_vec(article) {
            Ok(bytes) => cache.set(key.as_str(), bytes, ttl).await,
            Err(e) => Err(CacheError::from(e)),
        };
        match res {
            Ok(()) => {
                report.written += 1;
                if !index.contains(&key) {
                    index.push(key);
                }
            }
            Err(e) => {
                report.failed += 1;
                counter!("digest_cache_write_errors_total").increment(1);
                tracing::warn!(
                    target: "cache",
                    key = %key,
                    title = %article.title,
                    backend = cache.backend(),
                    error = %e,
                    "failed to store article"
                );
            }
        }
    }

    match serde_json::to_vec(&index) {
        Ok(bytes) => {
            if let Err(e) = cache.set(DIGEST_INDEX_KEY, bytes, ttl).await {
                counter!("digest_cache_write_errors_total").increment(1);
                tracing::warn!(target: "cache", backend = cache.backend(), error = %e, "failed to store digest index");
            }
        }
        Err(e) => tracing::warn!(target: "cache", error = %e, "failed to encode digest index"),
    }

    counter!("digest_cache_writes_total").increment(report.written as u64);
    report
}

/// Rebuild the latest digest from the cache, in original order.
/// Entries that expired or no longer decode are skipped.
pub async fn load_digest(cache: &dyn ArticleCache) -> Result<Vec<Article>, CacheError> {
    let Some(raw_index) = cache.get(DIGEST_INDEX_KEY).await? else {
        return Ok(Vec::new());
    };
    let index: Vec<Fingerprint> = serde_json::from_slice(&raw_index)?;

    let mut out = Vec::with_capacity(index.len());
    for key in index {
        match cache.get(key.as_str()).await? {
            Some(bytes) => match serde_json::from_slice::<Article>(&bytes) {
                Ok(a) => out.push(a),
                Err(e) => {
                    tracing::warn!(target: "cache", key = %key, error = %e, "skipping undecodable cache entry")
                }
            },
            None => tracing::debug!(target: "cache", key = %key, "indexed entry already expired"),
        }
    }
    Ok(out)
}
