//! In-process LRU memo with per-entry expiry.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;

/// Entries kept per cache unless configured otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Thread-safe LRU map whose entries expire after an optional TTL.
///
/// Once `capacity` entries are stored, inserting evicts the least recently
/// used one. Expired entries are dropped lazily on `get`, or in bulk by
/// [`TtlCache::purge_expired`].
pub struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, (V, Instant)>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self::new(capacity, Some(ttl))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, (V, Instant)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, inserted_at: Instant, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(inserted_at) >= ttl)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            Some((value, inserted_at)) if !self.is_expired(*inserted_at, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().put(key, (value, Instant::now()));
    }

    /// Inserts every pair under a single lock acquisition.
    pub fn insert_many(&self, items: impl IntoIterator<Item = (K, V)>) {
        let now = Instant::now();
        let mut entries = self.lock();
        for (key, value) in items {
            entries.put(key, (value, now));
        }
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut entries = self.lock();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, (_, inserted_at))| self.is_expired(*inserted_at, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
