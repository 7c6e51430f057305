use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters collected by a single cache.
///
/// All counters only ever increase, except for [`entries`](Self::entries) which is a snapshot of
/// the current store size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// All calls going through the cache.
    pub accesses: u64,
    /// Calls that were served from the store, including calls that joined an in-flight
    /// computation.
    pub hits: u64,
    /// Actual invocations of the wrapped computation.
    pub computations: u64,
    /// Computations that failed, and were therefore not cached.
    pub failures: u64,
    /// Entries evicted because of explicit or watch-driven invalidation.
    pub invalidations: u64,
    /// The number of entries currently held.
    pub entries: u64,
}

impl CacheStats {
    /// Calls that had to wait for a fresh computation.
    pub fn misses(&self) -> u64 {
        self.accesses.saturating_sub(self.hits)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    accesses: AtomicU64,
    hits: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    pub fn access(&self) {
        self.accesses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: u64) -> CacheStats {
        CacheStats {
            accesses: self.accesses.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries,
        }
    }
}
