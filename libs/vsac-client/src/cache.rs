//! Value set cache stores
//!
//! Results are keyed by `<oid>_<version|latest>` and never expire. The store
//! is injected into [`VsacClient`](crate::VsacClient) so its lifetime is owned
//! by whoever builds the client.

use crate::models::ValueSetResult;
use async_trait::async_trait;
use lru::LruCache;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(identifier: &str, version: Option<&str>) -> Self {
        Self(format!("{}_{}", identifier, version.unwrap_or("latest")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// `None` for unbounded stores.
    pub capacity: Option<usize>,
}

#[async_trait]
pub trait ValueSetCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<ValueSetResult>;

    /// Insert or replace; the last writer wins.
    async fn set(&self, key: CacheKey, value: ValueSetResult);

    async fn clear(&self);

    async fn stats(&self) -> CacheStats;
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self, entries: usize, capacity: Option<usize>) -> CacheStats {
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            capacity,
        }
    }
}

/// Unbounded store; entries live until [`ValueSetCache::clear`].
#[derive(Debug, Default)]
pub struct InMemoryValueSetCache {
    entries: RwLock<HashMap<CacheKey, ValueSetResult>>,
    counters: Counters,
}

impl InMemoryValueSetCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ValueSetCache for InMemoryValueSetCache {
    async fn get(&self, key: &CacheKey) -> Option<ValueSetResult> {
        let entries = self.entries.read().await;
        let value = entries.get(key).cloned();
        self.counters.record(value.is_some());
        value
    }

    async fn set(&self, key: CacheKey, value: ValueSetResult) {
        let mut entries = self.entries.write().await;
        entries.insert(key, value);
    }

    async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.counters.reset();
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        self.counters.snapshot(entries.len(), None)
    }
}

/// Bounded store evicting the least recently used value set.
pub struct LruValueSetCache {
    entries: Mutex<LruCache<CacheKey, ValueSetResult>>,
    capacity: NonZeroUsize,
    counters: Counters,
}

impl LruValueSetCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            counters: Counters::default(),
        }
    }
}

#[async_trait]
impl ValueSetCache for LruValueSetCache {
    async fn get(&self, key: &CacheKey) -> Option<ValueSetResult> {
        let mut entries = self.entries.lock().await;
        let value = entries.get(key).cloned();
        self.counters.record(value.is_some());
        value
    }

    async fn set(&self, key: CacheKey, value: ValueSetResult) {
        let mut entries = self.entries.lock().await;
        if let Some((evicted, _)) = entries.push(key.clone(), value) {
            if evicted != key {
                tracing::debug!(key = %evicted, "Evicted value set from cache");
            }
        }
    }

    async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.counters.reset();
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        self.counters.snapshot(entries.len(), Some(self.capacity.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValueSetMetadata;

    fn result(id: &str) -> ValueSetResult {
        ValueSetResult::with_concepts(
            ValueSetMetadata {
                id: Some(id.to_string()),
                ..Default::default()
            },
            Vec::new(),
        )
    }

    #[test]
    fn key_defaults_to_latest() {
        assert_eq!(CacheKey::new("1.2.3", None).as_str(), "1.2.3_latest");
        assert_eq!(CacheKey::new("1.2.3", Some("20240101")).as_str(), "1.2.3_20240101");
    }

    #[tokio::test]
    async fn in_memory_round_trip_and_stats() {
        let cache = InMemoryValueSetCache::new();
        let key = CacheKey::new("1.2.3", None);

        assert!(cache.get(&key).await.is_none());
        cache.set(key.clone(), result("1.2.3")).await;
        assert_eq!(cache.get(&key).await, Some(result("1.2.3")));

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.capacity, None);

        cache.clear().await;
        assert_eq!(cache.stats().await, CacheStats::default());
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn versions_are_cached_separately() {
        let cache = InMemoryValueSetCache::new();
        cache.set(CacheKey::new("1.2.3", None), result("latest")).await;
        cache
            .set(CacheKey::new("1.2.3", Some("2023")), result("2023"))
            .await;
        assert_eq!(cache.stats().await.entries, 2);
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let cache = LruValueSetCache::new(NonZeroUsize::new(2).unwrap());
        let a = CacheKey::new("1.1", None);
        let b = CacheKey::new("1.2", None);
        let c = CacheKey::new("1.3", None);

        cache.set(a.clone(), result("a")).await;
        cache.set(b.clone(), result("b")).await;
        assert!(cache.get(&a).await.is_some());
        cache.set(c.clone(), result("c")).await;

        assert!(cache.get(&a).await.is_some());
        assert!(cache.get(&b).await.is_none());
        assert!(cache.get(&c).await.is_some());
        assert_eq!(cache.stats().await.capacity, Some(2));
    }
}
