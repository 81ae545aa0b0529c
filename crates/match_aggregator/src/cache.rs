//! URL-keyed TTL cache for upstream JSON bodies.
//!
//! Every entry carries its own expiry. Nothing is evicted; a stale entry just
//! gets overwritten by the next successful fetch. Failed fetches are never
//! stored, so the next call retries right away.
//!
//! Concurrent misses on the same key are not coalesced: two tasks racing on a
//! cold key both hit the upstream and the later write wins.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry {
    value: Arc<Value>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub live: usize,
    pub expired: usize,
}

#[derive(Default)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live entry for `key`, or runs `fetch` and stores its result for `ttl`.
    /// A zero `ttl` bypasses the cache completely.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Option<Arc<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Value>>,
    {
        if ttl.is_zero() {
            return fetch().await.map(Arc::new);
        }

        if let Some(hit) = self.get_live(key).await {
            debug!("cache hit {}", key);
            return Some(hit);
        }

        let value = Arc::new(fetch().await?);
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::clone(&value),
                expires_at: Instant::now() + ttl,
            },
        );
        Some(value)
    }

    async fn get_live(&self, key: &str) -> Option<Arc<Value>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| Arc::clone(&e.value))
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let live = entries.values().filter(|e| now < e.expires_at).count();
        CacheStats {
            live,
            expired: entries.len() - live,
        }
    }
}
