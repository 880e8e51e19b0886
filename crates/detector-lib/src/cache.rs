//! Volatile model parameter cache (cache-aside)
//!
//! Bounded LRU with per-entry TTL, keyed by (series_id, selector). The cache
//! is populated only on read-miss and is never a source of truth: on a miss,
//! expiry, or explicit invalidation the store is authoritative. Activation
//! invalidates the active-selector key only; pinned-version entries hold
//! immutable data and are left to TTL and capacity eviction.

use crate::models::{ModelParams, VersionSelector};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default entry budget
const DEFAULT_CAPACITY: usize = 1024;

/// Default time-to-live, matching the serving tier's one-hour parameter TTL
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction
    pub capacity: usize,
    /// Time-to-live for every entry
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    series_id: String,
    selector: VersionSelector,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    version: u64,
    params: ModelParams,
    inserted_at: Instant,
}

struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Recency order, least recently used at the front
    recency: VecDeque<CacheKey>,
}

/// Shared LRU+TTL cache for model parameters
pub struct ModelCache {
    inner: Mutex<CacheInner>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ModelCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(config.capacity.min(4096)),
                recency: VecDeque::new(),
            }),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Look up cached parameters; expired entries are dropped and count as
    /// misses
    pub fn get(&self, series_id: &str, selector: VersionSelector) -> Option<(u64, ModelParams)> {
        let key = CacheKey {
            series_id: series_id.to_string(),
            selector,
        };

        let mut inner = self.inner.lock().expect("cache lock poisoned");

        // Copy out the entry state first so the map borrow ends before any
        // mutation below
        let found = inner
            .entries
            .get(&key)
            .map(|entry| (entry.version, entry.params, entry.inserted_at.elapsed()));

        match found {
            Some((version, params, age)) if age < self.config.ttl => {
                inner.recency.retain(|k| k != &key);
                inner.recency.push_back(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some((version, params))
            }
            Some(_) => {
                inner.entries.remove(&key);
                inner.recency.retain(|k| k != &key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert parameters fetched from the store, evicting the least recently
    /// used entries at capacity
    pub fn put(
        &self,
        series_id: &str,
        selector: VersionSelector,
        version: u64,
        params: ModelParams,
    ) {
        let key = CacheKey {
            series_id: series_id.to_string(),
            selector,
        };

        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if inner.entries.contains_key(&key) {
            inner.recency.retain(|k| k != &key);
        }
        while inner.entries.len() >= self.config.capacity && !inner.entries.contains_key(&key) {
            match inner.recency.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                version,
                params,
                inserted_at: Instant::now(),
            },
        );
        inner.recency.push_back(key);
    }

    /// Drop the active-selector entry for a series
    ///
    /// Called by the version manager strictly after activation commits.
    /// Pinned entries are untouched: a superseded version's parameters are
    /// immutable, so those entries stay valid until TTL or eviction.
    pub fn invalidate_active(&self, series_id: &str) {
        let key = CacheKey {
            series_id: series_id.to_string(),
            selector: VersionSelector::Active,
        };

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.entries.remove(&key).is_some() {
            inner.recency.retain(|k| k != &key);
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counters and occupancy
    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.lock().expect("cache lock poisoned").entries.len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries,
            capacity: self.config.capacity,
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Cache counters for metrics and health
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub capacity: usize,
}
