//! Cache backend with L1 (DashMap) and optional L2 (Redis) tiers.
//!
//! Redis failures are logged and swallowed: a cache problem never fails
//! the request that hit it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// A cached entry with TTL support. The payload is `Arc`-wrapped so
/// cache hits clone a pointer, not the serialized page.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Single-instance deployments run `Local` (DashMap only); multi-instance
/// deployments add Redis as a shared L2 with the DashMap in front.
#[derive(Clone)]
pub enum CacheBackend {
    Local(Arc<DashMap<String, CachedEntry>>),
    Redis {
        redis: Pool,
        local: Arc<DashMap<String, CachedEntry>>,
    },
}

impl CacheBackend {
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis {
            redis: redis_pool,
            local: Arc::new(DashMap::new()),
        }
    }

    /// L1 first, then L2; an L2 hit is promoted to L1 with its original
    /// TTL unknowable, so it gets the list TTL as an upper bound.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        match self {
            CacheBackend::Local(map) => map
                .get(key)
                .filter(|entry| !entry.is_expired())
                .map(|entry| Arc::clone(&entry.data)),
            CacheBackend::Redis { redis, local } => {
                if let Some(entry) = local.get(key) {
                    if !entry.is_expired() {
                        debug!(key = %key, "cache hit (L1)");
                        return Some(Arc::clone(&entry.data));
                    }
                    drop(entry);
                    local.remove(key);
                }

                let mut conn = match redis.get().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "failed to get Redis connection");
                        return None;
                    }
                };
                match conn.get::<_, Option<Vec<u8>>>(key).await {
                    Ok(Some(data)) => {
                        debug!(key = %key, "cache hit (L2)");
                        let entry = CachedEntry::new(data, super::LIST_TTL);
                        let data_arc = Arc::clone(&entry.data);
                        local.insert(key.to_string(), entry);
                        Some(data_arc)
                    }
                    Ok(None) => {
                        debug!(key = %key, "cache miss");
                        None
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Redis GET error");
                        None
                    }
                }
            }
        }
    }

    /// Write-through to L1; the L2 write is fire-and-forget.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
            }
            CacheBackend::Redis { redis, local } => {
                let entry = CachedEntry::new(value, ttl);
                let data_for_redis = Arc::clone(&entry.data);
                local.insert(key.to_string(), entry);

                let redis = redis.clone();
                let key = key.to_string();
                let ttl_secs = ttl.as_secs();
                tokio::spawn(async move {
                    if let Ok(mut conn) = redis.get().await {
                        if let Err(e) = conn
                            .set_ex::<_, _, ()>(&key, &*data_for_redis, ttl_secs)
                            .await
                        {
                            warn!(key = %key, error = %e, "Redis SET error");
                        }
                    }
                });
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        match self {
            CacheBackend::Local(map) => {
                map.remove(key);
            }
            CacheBackend::Redis { redis, local } => {
                local.remove(key);
                let redis = redis.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    if let Ok(mut conn) = redis.get().await
                        && let Err(e) = conn.del::<_, ()>(&key).await
                    {
                        warn!(key = %key, error = %e, "Redis DEL error");
                    }
                });
            }
        }
    }

    /// Drops every key starting with `prefix`. Used after writes to
    /// invalidate all cached list pages of an entity; best-effort and
    /// non-atomic, stale reads are bounded by the TTL.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        match self {
            CacheBackend::Local(map) => {
                map.retain(|key, _| !key.starts_with(prefix));
            }
            CacheBackend::Redis { redis, local } => {
                local.retain(|key, _| !key.starts_with(prefix));

                let redis = redis.clone();
                let pattern = format!("{prefix}*");
                tokio::spawn(async move {
                    let mut conn = match redis.get().await {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "failed to get Redis connection");
                            return;
                        }
                    };
                    let mut cursor: u64 = 0;
                    loop {
                        let scanned: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(100)
                            .query_async(&mut conn)
                            .await;
                        let (next, keys) = match scanned {
                            Ok(r) => r,
                            Err(e) => {
                                warn!(pattern = %pattern, error = %e, "Redis SCAN error");
                                return;
                            }
                        };
                        if !keys.is_empty()
                            && let Err(e) = conn.del::<_, ()>(keys).await
                        {
                            warn!(pattern = %pattern, error = %e, "Redis DEL error");
                        }
                        cursor = next;
                        if cursor == 0 {
                            break;
                        }
                    }
                });
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Deserialized read for handlers caching JSON payloads.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %key, error = %e, "cached payload failed to deserialize, dropping");
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Serialized write; serialization failure just skips the cache.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, bytes, ttl).await,
            Err(e) => warn!(key = %key, error = %e, "failed to serialize cache payload"),
        }
    }

    /// Redis reachability, reported by the readiness endpoint.
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => false,
            CacheBackend::Redis { redis, .. } => redis.get().await.is_ok(),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis { .. } => "redis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_set_get_roundtrip() {
        let cache = CacheBackend::new_local();
        cache
            .set("k", b"payload".to_vec(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref().map(|v| v.as_slice()), Some(b"payload".as_slice()));
        assert!(cache.exists("k").await);
        assert!(!cache.exists("other").await);
    }

    #[tokio::test]
    async fn test_local_entry_expires() {
        let cache = CacheBackend::new_local();
        cache.set("k", b"v".to_vec(), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_spares_other_entities() {
        let cache = CacheBackend::new_local();
        cache
            .set("licenses:list:admin:-:1:10", b"a".to_vec(), Duration::from_secs(60))
            .await;
        cache
            .set("licenses:list:admin:-:2:10", b"b".to_vec(), Duration::from_secs(60))
            .await;
        cache
            .set("licenses:detail:5", b"c".to_vec(), Duration::from_secs(60))
            .await;
        cache
            .set("tickets:list:admin:-:1:10", b"d".to_vec(), Duration::from_secs(60))
            .await;

        cache.invalidate_prefix("licenses:list:").await;

        assert!(cache.get("licenses:list:admin:-:1:10").await.is_none());
        assert!(cache.get("licenses:list:admin:-:2:10").await.is_none());
        assert!(cache.get("licenses:detail:5").await.is_some());
        assert!(cache.get("tickets:list:admin:-:1:10").await.is_some());
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let cache = CacheBackend::new_local();
        cache
            .set_json("k", &vec![1i64, 2, 3], Duration::from_secs(60))
            .await;
        let got: Option<Vec<i64>> = cache.get_json("k").await;
        assert_eq!(got, Some(vec![1, 2, 3]));
    }
}
