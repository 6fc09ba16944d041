//! Cache entry types and statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Holds the latest successful result
    Fresh,
    /// Invalidated (or expired); the next read reloads
    Stale,
    /// A load is in flight
    Pending,
}

/// Cache key for a page request: upper-cased method, a space, then the URL
///
/// ```
/// assert_eq!(rhtmx_loader::cache_key("get", "/blog/hello?page=2"), "GET /blog/hello?page=2");
/// ```
pub fn cache_key(method: &str, url: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), url)
}

/// Age of a value loaded at `loaded_at`, clamped at zero
pub(crate) fn age(loaded_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(loaded_at)
        .to_std()
        .unwrap_or(Duration::from_secs(0))
}

/// Statistics for the loader cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served from a fresh entry
    pub hits: u64,

    /// Reads that started a load
    pub misses: u64,

    /// Reads that joined a load already in flight
    pub coalesced: u64,

    /// Loads that completed successfully
    pub loads: u64,

    /// Loads that returned an error or panicked
    pub failures: u64,

    /// Entries marked stale by an explicit invalidation
    pub invalidations: u64,

    /// Number of keys currently held
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of reads that did not trigger a load
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) loads: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) invalidations: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries,
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.coalesced,
            &self.loads,
            &self.failures,
            &self.invalidations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
