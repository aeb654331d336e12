//! In-process caches with distinct expiry policies.
//!
//! [`AccessExpiringLru`] bounds entries by count and evicts entries that
//! have not been read for an idle period. [`WriteExpiringCache`] forgets an
//! entry a fixed time after it was written, however often it is read.
//!
//! Both are `Sync` and hand out clones; the internal lock is never held
//! while the caller computes a value.

use lru::LruCache;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct Accessed<V> {
    value: V,
    last_access: Instant,
}

/// Least-recently-used cache whose entries also expire after `idle`
/// without a read.
pub struct AccessExpiringLru<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Accessed<V>>>,
    idle: Duration,
    counters: Counters,
}

impl<K: Hash + Eq, V: Clone> AccessExpiringLru<K, V> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize, idle: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            idle,
            counters: Counters::default(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = lock(&self.entries);
        let expired = match entries.get_mut(key) {
            Some(entry) if entry.last_access.elapsed() < self.idle => {
                entry.last_access = Instant::now();
                self.counters.hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        self.counters.miss();
        None
    }

    pub fn insert(&self, key: K, value: V) {
        lock(&self.entries).put(
            key,
            Accessed {
                value,
                last_access: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        lock(&self.entries).pop(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock(&self.entries).cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }
}

struct Written<V> {
    value: V,
    written: Instant,
}

/// Map whose entries are forgotten `ttl` after they were written.
pub struct WriteExpiringCache<K, V> {
    entries: Mutex<HashMap<K, Written<V>>>,
    ttl: Duration,
    counters: Counters,
}

impl<K: Hash + Eq, V: Clone> WriteExpiringCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            counters: Counters::default(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some(entry) if entry.written.elapsed() < self.ttl => {
                self.counters.hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.counters.miss();
                None
            }
            None => {
                self.counters.miss();
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        lock(&self.entries).insert(
            key,
            Written {
                value,
                written: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(lock(&self.entries).len())
    }
}
