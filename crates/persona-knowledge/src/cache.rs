//! Bounded query cache for retrieval results.
//!
//! Keys are normalized queries. With the default [`EvictionPolicy::InsertionOrder`]
//! the oldest *inserted* key is evicted once capacity is exceeded, no matter
//! how often it was hit since. This is not LRU; pick
//! [`EvictionPolicy::LeastRecentlyUsed`] for that.

use indexmap::IndexMap;
use persona_core::config::EvictionPolicy;
use persona_core::types::FactEntry;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Process-wide query → result cache, safe to share between requests.
pub struct QueryCache {
    entries: Mutex<IndexMap<String, Vec<Arc<FactEntry>>>>,
    capacity: usize,
    policy: EvictionPolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl QueryCache {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: Mutex::new(IndexMap::with_capacity(capacity + 1)),
            capacity,
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Vec<Arc<FactEntry>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a normalized query, counting the hit or miss.
    pub fn get(&self, key: &str) -> Option<Vec<Arc<FactEntry>>> {
        let mut entries = self.lock();
        let Some(idx) = entries.get_index_of(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        self.hits.fetch_add(1, Ordering::Relaxed);
        if self.policy == EvictionPolicy::LeastRecentlyUsed {
            let last = entries.len() - 1;
            entries.move_index(idx, last);
            return entries.get_index(last).map(|(_, v)| v.clone());
        }
        entries.get_index(idx).map(|(_, v)| v.clone())
    }

    /// Store a result, evicting from the front while over capacity.
    ///
    /// Re-inserting an existing key replaces its value but keeps its position.
    pub fn insert(&self, key: String, value: Vec<Arc<FactEntry>>) {
        let mut entries = self.lock();
        entries.insert(key, value);

        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Query cache evicted '{evicted}'");
            } else {
                break;
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Keys from next-to-evict to most recent.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(20, EvictionPolicy::InsertionOrder)
    }
}
