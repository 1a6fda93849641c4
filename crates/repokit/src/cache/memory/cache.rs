//! In-memory cache implementation with LRU eviction.
//!
//! Provides a thread-safe in-memory cache with TTL support using tokio
//! synchronization primitives and LRU eviction policy.
//!
//! Keys are tracked per repository namespace (the part before the first
//! `:`), so purging a namespace touches only that namespace's keys.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use repokit_core::cache::{namespace_of, Cache, Result};

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, CacheEntry>,
    /// namespace -> keys currently stored under it.
    tracking: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn track(&mut self, key: &str) {
        if let Some(namespace) = namespace_of(key) {
            self.tracking
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn untrack(&mut self, key: &str) {
        let Some(namespace) = namespace_of(key) else {
            return;
        };
        if let Some(keys) = self.tracking.get_mut(namespace) {
            keys.remove(key);
            if keys.is_empty() {
                self.tracking.remove(namespace);
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        self.untrack(key);
        self.entries.pop(key).is_some()
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Supports TTL with lazy expiration: an expired entry is removed by the
/// lookup that finds it. Uses LRU eviction to bound memory once
/// `max_entries` is reached.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache holding at most `max_entries` values
    /// (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: LruCache::new(capacity),
                tracking: HashMap::new(),
            })),
        }
    }

    /// Number of stored entries, expired ones included until looked up.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write().await;

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = CacheEntry::new(value.to_vec(), ttl);

        if let Some((evicted, _)) = inner.entries.push(key.to_string(), entry) {
            if evicted != key {
                inner.untrack(&evicted);
            }
        }
        inner.track(key);

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;

        let candidates: Vec<String> = match namespace_of(prefix) {
            Some(namespace) => inner
                .tracking
                .get(namespace)
                .map(|keys| keys.iter().filter(|k| k.starts_with(prefix)).cloned().collect())
                .unwrap_or_default(),
            // No namespace in the prefix: fall back to a full scan.
            None => inner
                .entries
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, _)| key.clone())
                .collect(),
        };

        let mut removed = 0;
        for key in candidates {
            if inner.remove(&key) {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Default max entries for tests
    const TEST_MAX_ENTRIES: usize = 1000;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:key";
        let value = b"test value";

        cache.set(key, value, None).await.unwrap();
        let result = cache.get(key).await.unwrap();

        assert_eq!(result, Some(value.to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let result = cache.get("nonexistent:key").await.unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:delete";

        cache.set(key, b"to be deleted", None).await.unwrap();
        assert!(cache.get(key).await.unwrap().is_some());

        cache.delete(key).await.unwrap();
        assert!(cache.get(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration_removes_entry() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        let key = "test:ttl";

        cache
            .set(key, b"short-lived", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.get(key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get(key).await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_by_prefix() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        cache.set("UserRepository:findById:a", b"1", None).await.unwrap();
        cache.set("UserRepository:count:b", b"2", None).await.unwrap();
        cache.set("UserRepositoryV2:findById:a", b"3", None).await.unwrap();
        cache.set("BookingRepository:findById:a", b"4", None).await.unwrap();

        let removed = cache.delete_by_prefix("UserRepository:").await.unwrap();

        assert_eq!(removed, 2);
        assert!(cache.get("UserRepository:findById:a").await.unwrap().is_none());
        assert!(cache.get("UserRepository:count:b").await.unwrap().is_none());
        assert!(cache.get("UserRepositoryV2:findById:a").await.unwrap().is_some());
        assert!(cache.get("BookingRepository:findById:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_method_prefix() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        cache.set("R:aggregate:1", b"1", None).await.unwrap();
        cache.set("R:count:1", b"2", None).await.unwrap();

        assert_eq!(cache.delete_by_prefix("R:aggregate:").await.unwrap(), 1);
        assert!(cache.get("R:count:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix_without_namespace_scans() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        cache.set("plain-a", b"1", None).await.unwrap();
        cache.set("plain-b", b"2", None).await.unwrap();
        cache.set("other", b"3", None).await.unwrap();

        assert_eq!(cache.delete_by_prefix("plain").await.unwrap(), 2);
        assert!(cache.get("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix_no_matches() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);
        cache.set("UserRepository:x", b"value", None).await.unwrap();

        let removed = cache.delete_by_prefix("BookingRepository:").await.unwrap();

        assert_eq!(removed, 0);
        assert!(cache.get("UserRepository:x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(2);

        cache.set("R:a", b"1", None).await.unwrap();
        cache.set("R:b", b"2", None).await.unwrap();
        // Touch "a" so "b" is least recently used.
        cache.get("R:a").await.unwrap();
        cache.set("R:c", b"3", None).await.unwrap();

        assert!(cache.get("R:a").await.unwrap().is_some());
        assert!(cache.get("R:b").await.unwrap().is_none());
        assert!(cache.get("R:c").await.unwrap().is_some());

        // Evicted keys are no longer tracked, so the purge count is exact.
        assert_eq!(cache.delete_by_prefix("R:").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let cache = MemoryCache::new(TEST_MAX_ENTRIES);

        cache.set("R:a", b"1", None).await.unwrap();
        cache.set("R:a", b"2", None).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("R:a").await.unwrap(), Some(b"2".to_vec()));
    }
}
