use std::future::Future;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;
use serde::Serialize;
use tdrs_models::config::CacheConfig;
use tracing::debug;

/// A cached value together with its per-entry TTL.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl_seconds: u64,
}

/// Expiry policy reading the TTL off each entry. 0 = live for the process.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        if entry.ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(entry.ttl_seconds))
        }
    }
}

/// Process-wide key/value cache with per-entry TTL, backed by moka.
///
/// Shared read/write across concurrent runs; moka handles synchronization
/// and expiry. Entries are never mutated in place - a new `insert` under
/// the same key replaces the old entry wholesale.
pub struct TtlCache {
    inner: Cache<String, Entry>,
}

impl TtlCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_capacity)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    /// Insert a value with the given TTL in seconds. `ttl_seconds == 0`
    /// caches forever for the lifetime of the process.
    pub async fn insert(&self, key: String, value: String, ttl_seconds: u64) {
        self.inner.insert(key, Entry { value, ttl_seconds }).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Memoize an async operation under the given key.
    ///
    /// On a hit the cached value is returned without invoking `fetch`;
    /// on a miss `fetch` runs once and its result is stored with
    /// `ttl_seconds`. Errors are not cached.
    pub async fn memoize<F, Fut, E>(
        &self,
        key: &str,
        ttl_seconds: u64,
        fetch: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(hit) = self.get(key).await {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        debug!(key, "cache miss");
        let value = fetch().await?;
        self.insert(key.to_string(), value.clone(), ttl_seconds)
            .await;
        Ok(value)
    }
}

/// Build a memoization key from a function identity and serialized arguments.
pub fn memo_key<A: Serialize>(namespace: &str, args: &A) -> String {
    let args_json = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
    format!("{namespace}:{args_json}")
}
