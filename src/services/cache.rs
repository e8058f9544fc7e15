//! Time-boxed in-memory cache for boundary responses.
//!
//! Owned and consulted by the HTTP handlers only; the core services never
//! see it, so correctness does not depend on its contents. Only successful
//! responses are cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

/// TTL for the file listing endpoint.
pub const LIST_FILES_TTL: Duration = Duration::from_secs(60);

/// TTL for the paginated data endpoint.
pub const FILE_DATA_TTL: Duration = Duration::from_secs(120);

/// Request-parameter key -> serialized response, with TTL eviction.
///
/// Expired entries are dropped when read and swept on every insert, so the
/// map never grows past the set of keys requested within one TTL window.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh cached response for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // The entry we saw was stale; take the write lock to drop it.
        self.entries.write().await.remove(key);
        None
    }

    /// Cache `value` under `key` for `ttl`, sweeping anything expired.
    pub async fn insert(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn returns_cached_values_before_expiry() {
        let cache = ResponseCache::new();
        cache
            .insert("files:page=1", json!({"total": 3}), Duration::from_secs(60))
            .await;

        assert_eq!(cache.get("files:page=1").await, Some(json!({"total": 3})));
        assert_eq!(cache.get("files:page=2").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_read() {
        let cache = ResponseCache::new();
        cache
            .insert("key", json!(1), Duration::from_millis(5))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.get("key").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn insert_sweeps_expired_entries() {
        let cache = ResponseCache::new();
        cache
            .insert("old", json!(1), Duration::from_millis(5))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.insert("new", json!(2), Duration::from_secs(60)).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("new").await, Some(json!(2)));
    }
}
