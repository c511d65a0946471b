//! Caching layer for gossip deduplication
//!
//! Provides a bounded LRU cache shared between connection tasks, and on top of it the seen-set
//! that stops blocks, transactions and peer announcements from circulating forever on cyclic
//! peer graphs.
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Generic, thread-safe LRU cache wrapper using RwLock.
pub struct ThreadSafeCache<K, V> {
    cache: Arc<RwLock<LruCache<K, V>>>,
}

impl<K, V> ThreadSafeCache<K, V>
where
    K: Hash + Eq,
{
    /// Create a new LRU cache with specified capacity. A capacity of 0 is treated as 1.
    pub fn new_lru(capacity: usize) -> Self {
        let capacity_nz = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity_nz))),
        }
    }

    pub async fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut cache = self.cache.write().await;
        cache.pop(key)
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

impl<K, V> Clone for ThreadSafeCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Recently seen gossip item hashes with the time they were first seen.
///
/// An entry counts as seen until its TTL runs out or it is evicted by newer entries.
#[derive(Clone)]
pub struct SeenCache {
    entries: ThreadSafeCache<String, Instant>,
    ttl: Duration,
}

impl SeenCache {
    pub const DEFAULT_CAPACITY: usize = 10_000;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: ThreadSafeCache::new_lru(capacity),
            ttl,
        }
    }

    /// Records `key` and returns true if it was not already seen. The check and the insert
    /// happen under one write lock, so concurrent deliveries of the same item see exactly one
    /// `true`.
    pub async fn insert_if_new(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut cache = self.entries.cache.write().await;
        if let Some(first_seen) = cache.peek(key) {
            if now.duration_since(*first_seen) < self.ttl {
                return false;
            }
        }
        cache.put(key.to_string(), now);
        true
    }

    /// Forgets `key`, letting the item be processed again.
    pub async fn forget(&self, key: &str) {
        self.entries.remove(key).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.len().await
    }

}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_TTL)
    }
}
