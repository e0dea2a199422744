// src/cache/memory.rs
//! In-process TTL map. Used when no Redis is configured, and in tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::ArticleCache;
use crate::error::CacheError;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Absolute TTL (no refresh on read). Expired entries are purged on every write and on a
/// read of the expired key.
#[derive(Default)]
pub struct InMemoryCache {
    inner: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        match self.inner.lock() {
            Ok(g) => g.values().filter(|e| !e.is_expired(now)).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.inner
            .lock()
            .map_err(|_| CacheError::Backend("in-memory cache mutex poisoned".to_string()))
    }
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("live_entries", &self.len())
            .finish()
    }
}

#[async_trait]
impl ArticleCache for InMemoryCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut g = self.lock()?;
        // keys from earlier digests are never read again; drop them here
        g.retain(|_, e| !e.is_expired(now));
        g.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        let mut g = self.lock()?;
        match g.get(key) {
            Some(e) if e.is_expired(now) => {
                g.remove(key);
                Ok(None)
            }
            Some(e) => Ok(Some(e.value.clone())),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
