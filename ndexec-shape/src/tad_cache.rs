//! Memoized tad tables.
//!
//! Tad packs are keyed by `(shape descriptor, normalized axes)` and kept in a
//! bounded least-recently-used map. A miss builds the pack on demand, so
//! callers never see the difference between a hit and a miss.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::helpers::normalize_axes;
use crate::shape_info::ShapeInfo;
use crate::tad::TadPack;
use crate::{NdError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    shape: ShapeInfo,
    axes: Vec<usize>,
}

/// Counters describing cache behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TadCacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub entries: usize,
}

impl TadCacheStats {
    /// Fraction of lookups served from the cache (0.0 when unused).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry {
    pack: Arc<TadPack>,
    last_access: u64,
}

struct Inner {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
    stats: TadCacheStats,
}

/// Thread-safe LRU cache of [`TadPack`]s.
///
/// Cloning the cache shares the underlying storage.
#[derive(Clone)]
pub struct TadCache {
    inner: Arc<Mutex<Inner>>,
}

impl TadCache {
    /// Cache holding at most `capacity` packs (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity: capacity.max(1),
                entries: HashMap::new(),
                clock: 0,
                stats: TadCacheStats::default(),
            })),
        }
    }

    /// Pack of `shape` along `axes`, built on a miss.
    pub fn get(&self, shape: &ShapeInfo, axes: &[isize]) -> Result<Arc<TadPack>> {
        if axes.is_empty() {
            return Err(NdError::invalid("tad", "empty axis list"));
        }
        let axes = normalize_axes("tad", shape.rank(), axes)?;
        let key = CacheKey {
            shape: shape.clone(),
            axes,
        };

        {
            let mut inner = self.lock();
            inner.clock += 1;
            let now = inner.clock;
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.last_access = now;
                let pack = Arc::clone(&entry.pack);
                inner.stats.hits += 1;
                return Ok(pack);
            }
            inner.stats.misses += 1;
        }

        // Build outside the lock; a concurrent builder of the same key just
        // overwrites an identical pack.
        let pack = Arc::new(TadPack::build_normalized(&key.shape, &key.axes)?);

        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.capacity {
            inner.evict_lru();
        }
        inner.clock += 1;
        let now = inner.clock;
        inner.entries.insert(
            key,
            CacheEntry {
                pack: Arc::clone(&pack),
                last_access: now,
            },
        );
        inner.stats.entries = inner.entries.len();
        Ok(pack)
    }

    pub fn stats(&self) -> TadCacheStats {
        let inner = self.lock();
        TadCacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached pack; statistics are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats.entries = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            tracing::trace!(evictions = self.stats.evictions, "tad cache eviction");
        }
    }
}

impl Default for TadCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for TadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TadCache")
            .field("stats", &self.stats())
            .finish()
    }
}
