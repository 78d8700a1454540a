//! RAM thumbnail cache with LRU eviction
//!
//! Keeps canonical thumbnail bytes in memory, evicting the least recently used
//! entries once the byte budget is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::key::CacheKey;
use crate::store::{BoxFuture, CacheError, CacheLookup, ThumbnailCache};

/// A stored thumbnail
#[derive(Debug, Clone)]
struct CachedThumbnail {
    bytes: Vec<u8>,
    mime_type: String,
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries currently in cache
    pub entry_count: usize,

    /// Total bytes held by cached entries
    pub memory_used: usize,

    /// Maximum bytes allowed
    pub memory_limit: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of entries evicted due to memory pressure
    pub evictions: u64,

    /// Entries refused because they alone exceed the limit
    pub rejected: u64,
}

impl CacheStats {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Memory utilization (0.0 to 1.0)
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_limit as f64
        }
    }
}

struct CacheState {
    entries: HashMap<CacheKey, CachedThumbnail>,

    /// Most recently used at back, least recently used at front
    lru_queue: VecDeque<CacheKey>,

    memory_used: usize,
    memory_limit: usize,
    stats: CacheStats,
}

impl CacheState {
    fn new(memory_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            memory_used: 0,
            memory_limit,
            stats: CacheStats { memory_limit, ..Default::default() },
        }
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(position) = self.lru_queue.iter().position(|queued| queued == key) {
            self.lru_queue.remove(position);
        }
        self.lru_queue.push_back(key.clone());
    }

    fn remove_entry(&mut self, key: &CacheKey) -> Option<CachedThumbnail> {
        let entry = self.entries.remove(key)?;
        self.memory_used = self.memory_used.saturating_sub(entry.bytes.len());
        self.lru_queue.retain(|queued| queued != key);
        self.sync_stats();
        Some(entry)
    }

    fn evict_lru(&mut self) -> bool {
        let Some(key) = self.lru_queue.pop_front() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.memory_used = self.memory_used.saturating_sub(entry.bytes.len());
            self.stats.evictions += 1;
            tracing::trace!(key = %key, bytes = entry.bytes.len(), "thumbnail evicted from ram cache");
        }
        self.sync_stats();
        true
    }

    fn evict_to_fit(&mut self, required_size: usize) {
        while self.memory_used + required_size > self.memory_limit && !self.entries.is_empty() {
            if !self.evict_lru() {
                break;
            }
        }
    }

    fn sync_stats(&mut self) {
        self.stats.entry_count = self.entries.len();
        self.stats.memory_used = self.memory_used;
    }
}

/// In-memory [`ThumbnailCache`] bounded by total bytes
///
/// Clones share the same storage.
///
/// # Example
///
/// ```
/// use nview_cache::{CacheKey, RamThumbnailCache};
///
/// let cache = RamThumbnailCache::with_mb_limit(8);
/// let key = CacheKey::canonical("covers/one.jpg");
///
/// cache.insert(key.clone(), vec![0xff, 0xd8, 0xff]);
/// assert!(cache.lookup(&key).is_hit());
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Clone)]
pub struct RamThumbnailCache {
    state: Arc<Mutex<CacheState>>,
}

impl RamThumbnailCache {
    /// Create a cache holding at most `memory_limit` bytes
    pub fn new(memory_limit: usize) -> Self {
        Self { state: Arc::new(Mutex::new(CacheState::new(memory_limit))) }
    }

    /// Create a cache with a limit in megabytes
    pub fn with_mb_limit(megabytes: usize) -> Self {
        Self::new(megabytes.saturating_mul(1024 * 1024))
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `bytes` under `key`
    ///
    /// The entry's MIME type is the key's canonical type. Returns false if the
    /// entry alone is larger than the cache limit.
    pub fn insert(&self, key: CacheKey, bytes: Vec<u8>) -> bool {
        let mut state = self.lock();
        state.remove_entry(&key);

        let size = bytes.len();
        if size > state.memory_limit {
            state.stats.rejected += 1;
            tracing::debug!(key = %key, bytes = size, "thumbnail larger than ram cache limit");
            return false;
        }

        state.evict_to_fit(size);
        state.memory_used += size;
        let mime_type = key.mime_type.clone();
        state.touch(&key);
        state.entries.insert(key, CachedThumbnail { bytes, mime_type });
        state.sync_stats();
        true
    }

    /// Read the entry for `key`, updating LRU order and statistics
    pub fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let mut state = self.lock();
        match state.entries.get(key).cloned() {
            Some(entry) => {
                state.touch(key);
                state.stats.hits += 1;
                CacheLookup::Hit { bytes: entry.bytes, mime_type: entry.mime_type }
            }
            None => {
                state.stats.misses += 1;
                CacheLookup::Miss
            }
        }
    }

    /// Whether `key` is stored, without touching LRU order
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Remove the entry for `key`, returning its bytes
    pub fn remove(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.lock().remove_entry(key).map(|entry| entry.bytes)
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.lru_queue.clear();
        state.memory_used = 0;
        state.sync_stats();
    }

    /// Change the byte limit, evicting as needed
    pub fn set_memory_limit(&self, new_limit: usize) {
        let mut state = self.lock();
        state.memory_limit = new_limit;
        state.stats.memory_limit = new_limit;
        state.evict_to_fit(0);
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl Default for RamThumbnailCache {
    /// 64MB limit
    fn default() -> Self {
        Self::with_mb_limit(64)
    }
}

impl ThumbnailCache for RamThumbnailCache {
    fn get(&self, key: &CacheKey) -> BoxFuture<'_, Result<CacheLookup, CacheError>> {
        let lookup = self.lookup(key);
        Box::pin(async move { Ok(lookup) })
    }

    fn put(&self, key: CacheKey, bytes: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            if self.insert(key, bytes) {
                Ok(())
            } else {
                Err(CacheError::Backend("entry exceeds ram cache limit".to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> CacheKey {
        CacheKey::canonical(path)
    }

    #[test]
    fn insert_and_lookup() {
        let cache = RamThumbnailCache::new(1024);
        assert!(cache.insert(key("a.jpg"), vec![1, 2, 3]));

        match cache.lookup(&key("a.jpg")) {
            CacheLookup::Hit { bytes, mime_type } => {
                assert_eq!(bytes, vec![1, 2, 3]);
                assert_eq!(mime_type, "image/jpeg");
            }
            CacheLookup::Miss => panic!("expected hit"),
        }
        assert_eq!(cache.lookup(&key("b.jpg")), CacheLookup::Miss);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = RamThumbnailCache::new(30);
        cache.insert(key("a"), vec![0; 10]);
        cache.insert(key("b"), vec![0; 10]);
        cache.insert(key("c"), vec![0; 10]);

        // Touch "a" so "b" becomes the oldest
        assert!(cache.lookup(&key("a")).is_hit());
        cache.insert(key("d"), vec![0; 10]);

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert!(cache.contains(&key("d")));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().memory_used, 30);
    }

    #[test]
    fn replacing_an_entry_updates_memory() {
        let cache = RamThumbnailCache::new(100);
        cache.insert(key("a"), vec![0; 40]);
        cache.insert(key("a"), vec![0; 10]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().memory_used, 10);
    }

    #[test]
    fn oversized_entry_is_rejected() {
        let cache = RamThumbnailCache::new(8);
        assert!(!cache.insert(key("big"), vec![0; 9]));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rejected, 1);
    }

    #[test]
    fn shrinking_limit_evicts() {
        let cache = RamThumbnailCache::new(100);
        for name in ["a", "b", "c", "d"] {
            cache.insert(key(name), vec![0; 20]);
        }

        cache.set_memory_limit(40);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key("c")));
        assert!(cache.contains(&key("d")));
        assert_eq!(cache.stats().memory_utilization(), 1.0);
    }

    #[test]
    fn remove_and_clear() {
        let cache = RamThumbnailCache::new(100);
        cache.insert(key("a"), vec![7; 5]);
        cache.insert(key("b"), vec![8; 5]);

        assert_eq!(cache.remove(&key("a")), Some(vec![7; 5]));
        assert_eq!(cache.remove(&key("a")), None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().memory_used, 0);
    }

    #[tokio::test]
    async fn trait_object_round_trip() {
        let cache: Arc<dyn ThumbnailCache> = Arc::new(RamThumbnailCache::new(64));

        cache.put(key("p.jpg"), vec![1; 16]).await.unwrap();
        assert!(cache.get(&key("p.jpg")).await.unwrap().is_hit());
        assert!(!cache.get(&key("q.jpg")).await.unwrap().is_hit());
        assert!(cache.put(key("huge.jpg"), vec![0; 65]).await.is_err());
    }
}
