use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use super::stats::CacheStats;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    hit_count: u64,
    /// Logical clock value of the last read or write, for LRU.
    last_access: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    inserts: u64,
    invalidations: u64,
}

impl<V> Inner<V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        self.expirations += removed as u64;
        removed
    }

    fn evict_least_recent(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions += 1;
            debug!("Cache: evicted least recently used '{}'", key);
        }
    }
}

/// Thread-safe TTL cache keyed by string.
///
/// Values are cloned out on every hit, so `V` is usually cheap to clone
/// (`Arc`, small structs). The TTL is chosen per `put`, so one store can
/// hold entries with different lifetimes.
///
/// Every operation runs under a single mutex, which keeps the counters
/// consistent with the entries they describe.
#[derive(Debug)]
pub struct CacheStore<V> {
    name: &'static str,
    max_entries: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> CacheStore<V> {
    /// Create a store. `max_entries == 0` means unbounded.
    pub fn new(name: &'static str, max_entries: usize) -> Self {
        Self {
            name,
            max_entries,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                inserts: 0,
                invalidations: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Cache '{}' mutex was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }

    /// Look up a live entry, counting a hit or a miss.
    ///
    /// An expired entry counts as a miss and is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock_inner();
        let inner = &mut *guard;
        let tick = inner.tick();

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hit_count += 1;
                entry.last_access = tick;
                let value = entry.value.clone();
                inner.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            inner.expirations += 1;
            debug!("Cache '{}': '{}' expired", self.name, key);
        }
        inner.misses += 1;
        None
    }

    /// Look up a live entry without touching counters or recency.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.lock_inner()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` for `ttl`, replacing any previous entry.
    ///
    /// A zero TTL stores nothing.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            warn!("Cache '{}': TTL {:?} overflows, not caching '{}'", self.name, ttl, key);
            return;
        };

        let mut guard = self.lock_inner();
        let inner = &mut *guard;
        let tick = inner.tick();

        if self.max_entries > 0
            && !inner.entries.contains_key(&key)
            && inner.entries.len() >= self.max_entries
        {
            // Dead entries go first; only evict a live one if still full.
            inner.purge_expired(now);
            if inner.entries.len() >= self.max_entries {
                inner.evict_least_recent();
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at,
                hit_count: 0,
                last_access: tick,
            },
        );
        inner.inserts += 1;
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.lock_inner();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.invalidations += 1;
        }
        removed
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock_inner();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.invalidations += removed as u64;
        removed
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.lock_inner().purge_expired(Instant::now())
    }

    /// Number of stored entries, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Times a live entry has been served, if present.
    pub fn hit_count(&self, key: &str) -> Option<u64> {
        self.lock_inner().entries.get(key).map(|entry| entry.hit_count)
    }

    /// Age of a live entry, if present.
    pub fn age(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock_inner()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| now.duration_since(entry.created_at))
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock_inner();
        CacheStats {
            size: inner.entries.len(),
            hit_count: inner.hits,
            miss_count: inner.misses,
            eviction_count: inner.evictions,
            expired_count: inner.expirations,
            insert_count: inner.inserts,
            invalidation_count: inner.invalidations,
            hit_rate: CacheStats::ratio(inner.hits, inner.misses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_miss_then_hit() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);

        assert_eq!(cache.get("BTC"), None);
        cache.put("BTC", 65000, Duration::from_secs(60));
        assert_eq!(cache.get("BTC"), Some(65000));

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(cache.hit_count("BTC"), Some(1));
    }

    #[tokio::test]
    async fn test_entry_served_until_ttl_then_expires() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);
        cache.put("BTC", 1, Duration::from_secs(60));

        tokio::time::advance(Duration::from_millis(59_999)).await;
        assert_eq!(cache.get("BTC"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("BTC"), None);

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.eviction_count, 0);
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);
        cache.put("price", "short", Duration::from_secs(10));
        cache.put("answer", "long", Duration::from_secs(1800));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("price"), None);
        assert_eq!(cache.get("answer"), Some("long"));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_cached() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);
        cache.put("BTC", 1, Duration::ZERO);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().insert_count, 0);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 2);
        cache.put("A", 1, Duration::from_secs(60));
        cache.put("B", 2, Duration::from_secs(60));

        // Touch A so B becomes least recently used.
        assert_eq!(cache.get("A"), Some(1));
        cache.put("C", 3, Duration::from_secs(60));

        assert_eq!(cache.peek("B"), None);
        assert_eq!(cache.peek("A"), Some(1));
        assert_eq!(cache.peek("C"), Some(3));
        assert_eq!(cache.stats().eviction_count, 1);
    }

    #[tokio::test]
    async fn test_full_store_drops_expired_before_live() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 2);
        cache.put("old", 1, Duration::from_secs(1));
        cache.put("live", 2, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(2)).await;

        cache.put("new", 3, Duration::from_secs(60));

        let stats = cache.stats();
        assert_eq!(stats.eviction_count, 0);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(cache.peek("live"), Some(2));
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 1);
        cache.put("A", 1, Duration::from_secs(60));
        cache.put("A", 2, Duration::from_secs(60));

        assert_eq!(cache.peek("A"), Some(2));
        assert_eq!(cache.stats().eviction_count, 0);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);
        cache.put("A", 1, Duration::from_secs(60));
        cache.put("B", 2, Duration::from_secs(60));
        cache.put("C", 3, Duration::from_secs(60));

        assert!(cache.invalidate("A"));
        assert!(!cache.invalidate("A"));
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().invalidation_count, 3);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);
        cache.put("A", 1, Duration::from_secs(5));
        cache.put("B", 2, Duration::from_secs(50));
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_peek_does_not_count() {
        tokio::time::pause();
        let cache = CacheStore::new("test", 0);
        cache.put("A", 1, Duration::from_secs(5));
        cache.peek("A");
        cache.peek("missing");

        let stats = cache.stats();
        assert_eq!(stats.hit_count + stats.miss_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counters_consistent_under_concurrency() {
        let cache = Arc::new(CacheStore::new("test", 0));
        cache.put("BTC", 1, Duration::from_secs(600));

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let key = if i % 2 == 0 { "BTC" } else { "MISSING" };
                    cache.get(key)
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 100);
        assert_eq!(stats.miss_count, 100);
        assert_eq!(cache.hit_count("BTC"), Some(100));
    }
}
