//! Loader cache engine - single-flight loads and explicit revalidation

use crate::cache::{age, CacheStats, Counters, EntryState};
use crate::config::LoaderConfig;
use crate::error::LoadError;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, LoadError>>>;

/// A load in flight for one key
struct Flight<V> {
    id: u64,
    /// Slot epoch when the load started; any invalidation since then moves past it
    epoch: u64,
    /// State to restore on failure, `None` when the slot had no value
    prior: Option<EntryState>,
    future: SharedLoad<V>,
}

struct Slot<V> {
    value: Option<V>,
    loaded_at: Option<DateTime<Utc>>,
    state: EntryState,
    epoch: u64,
    flight: Option<Flight<V>>,
}

impl<V> Slot<V> {
    fn vacant() -> Self {
        Self {
            value: None,
            loaded_at: None,
            state: EntryState::Stale,
            epoch: 0,
            flight: None,
        }
    }

    fn expired(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        match (max_age, self.loaded_at) {
            (Some(max_age), Some(loaded_at)) => age(loaded_at, now) >= max_age,
            _ => false,
        }
    }

    fn servable(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> Option<&V> {
        if self.state != EntryState::Fresh || self.flight.is_some() || self.expired(max_age, now) {
            return None;
        }
        self.value.as_ref()
    }

    /// Never touches an in-flight load: the bumped epoch makes it land stale
    fn mark_stale(&mut self) {
        self.epoch += 1;
        if self.flight.is_none() {
            self.state = EntryState::Stale;
        }
    }
}

/// Keyed store of loader results shared by all requests
///
/// Concurrent reads of the same key coalesce into one load. Reads of
/// different keys never wait on each other's loads: the lock is only held
/// for bookkeeping, never across a loader call.
pub struct LoaderCache<V> {
    config: LoaderConfig,
    slots: Arc<RwLock<HashMap<String, Slot<V>>>>,
    next_flight: Arc<AtomicU64>,
    counters: Arc<Counters>,
}

impl<V> Clone for LoaderCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            slots: Arc::clone(&self.slots),
            next_flight: Arc::clone(&self.next_flight),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V> fmt::Debug for LoaderCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V> Default for LoaderCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl<V> LoaderCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            slots: Arc::new(RwLock::new(HashMap::new())),
            next_flight: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Get the cached value for `key` or load it
    ///
    /// - Fresh entry: returned without calling `loader`
    /// - Load already in flight: waits for that load instead of starting another
    /// - Missing or stale entry: runs `loader` and stores its result
    ///
    /// The loader runs on its own task, so a caller that gives up waiting
    /// does not abandon the load for everyone else. A failure reaches every
    /// caller waiting on that load; the previous value, if any, is kept.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<V, LoadError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        if let Some(value) = self.cached(key).await {
            Counters::bump(&self.counters.hits);
            tracing::debug!(key, "loader cache hit");
            return Ok(value);
        }

        loop {
            let mut slots = self.slots.write().await;
            let slot = slots.entry(key.to_string()).or_insert_with(Slot::vacant);

            if let Some(flight) = &slot.flight {
                let pending = flight.future.clone();
                if flight.epoch == slot.epoch {
                    drop(slots);
                    Counters::bump(&self.counters.coalesced);
                    tracing::debug!(key, "joining in-flight load");
                    return pending.await;
                }

                // Invalidated mid-load: that result lands stale, so wait and look again.
                drop(slots);
                let _ = pending.await;
                continue;
            }

            if let Some(value) = slot.servable(self.config.max_age, Utc::now()) {
                let value = value.clone();
                drop(slots);
                Counters::bump(&self.counters.hits);
                return Ok(value);
            }

            let pending = self.start(slot, key, loader);
            drop(slots);
            Counters::bump(&self.counters.misses);
            tracing::debug!(key, "loader cache miss");
            return pending.await;
        }
    }

    /// Spawns the load and records it on the slot; caller holds the write lock
    fn start<F, Fut>(&self, slot: &mut Slot<V>, key: &str, loader: F) -> SharedLoad<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed) + 1;
        let cache = self.clone();
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { loader().await })
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(LoadError::new(task_key.as_str(), error)),
                Err(_) => Err(LoadError::new(
                    task_key.as_str(),
                    anyhow::anyhow!("loader panicked"),
                )),
            };
            cache.settle(&task_key, id, &result).await;
            result
        });

        let join_key = key.to_string();
        let future = async move {
            handle.await.unwrap_or_else(|join_error| {
                Err(LoadError::new(join_key, anyhow::Error::new(join_error)))
            })
        }
        .boxed()
        .shared();

        slot.flight = Some(Flight {
            id,
            epoch: slot.epoch,
            prior: slot.value.is_some().then_some(slot.state),
            future: future.clone(),
        });
        slot.state = EntryState::Pending;
        future
    }

    /// Stores the outcome of flight `id`, unless the slot moved on without it
    async fn settle(&self, key: &str, id: u64, result: &Result<V, LoadError>) {
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        if slot.flight.as_ref().map(|flight| flight.id) != Some(id) {
            return;
        }
        let Some(flight) = slot.flight.take() else {
            return;
        };
        let superseded = flight.epoch != slot.epoch;

        match result {
            Ok(value) => {
                slot.value = Some(value.clone());
                slot.loaded_at = Some(Utc::now());
                slot.state = if superseded {
                    EntryState::Stale
                } else {
                    EntryState::Fresh
                };
                Counters::bump(&self.counters.loads);
                tracing::debug!(key, superseded, "load stored");
            }
            Err(error) => {
                Counters::bump(&self.counters.failures);
                tracing::debug!(key, error = %error, "load failed");
                match flight.prior {
                    Some(_) if superseded => slot.state = EntryState::Stale,
                    Some(prior) => slot.state = prior,
                    None => {
                        slots.remove(key);
                    }
                }
            }
        }
    }

    async fn cached(&self, key: &str) -> Option<V> {
        let slots = self.slots.read().await;
        slots
            .get(key)?
            .servable(self.config.max_age, Utc::now())
            .cloned()
    }

    /// Mark `key` stale so the next read reloads it
    ///
    /// Returns `false` (and does nothing) when the key is unknown. Never
    /// waits for an in-flight load: that load still completes, but its
    /// result is stored as stale.
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get_mut(key) {
            Some(slot) => {
                slot.mark_stale();
                Counters::bump(&self.counters.invalidations);
                tracing::debug!(key, "invalidated");
                true
            }
            None => false,
        }
    }

    /// Mark every key accepted by `predicate` stale; returns how many
    pub async fn invalidate_matching(&self, mut predicate: impl FnMut(&str) -> bool) -> usize {
        let mut slots = self.slots.write().await;
        let mut count = 0;
        for (key, slot) in slots.iter_mut() {
            if predicate(key) {
                slot.mark_stale();
                count += 1;
            }
        }
        Counters::add(&self.counters.invalidations, count as u64);
        count
    }

    /// Mark every key starting with `prefix` stale
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.invalidate_matching(|key| key.starts_with(prefix)).await
    }

    pub async fn invalidate_all(&self) -> usize {
        self.invalidate_matching(|_| true).await
    }

    /// Current state of `key`, with an expired fresh entry reported as stale
    pub async fn peek_state(&self, key: &str) -> Option<EntryState> {
        let slots = self.slots.read().await;
        let slot = slots.get(key)?;
        Some(match slot.state {
            EntryState::Fresh if slot.expired(self.config.max_age, Utc::now()) => EntryState::Stale,
            state => state,
        })
    }

    /// Last stored value for `key`, whatever its state
    pub async fn peek(&self, key: &str) -> Option<V> {
        self.slots.read().await.get(key)?.value.clone()
    }

    /// Drop every entry and reset statistics
    ///
    /// Loads still in flight complete for their waiters but are not stored.
    pub async fn clear(&self) {
        self.slots.write().await.clear();
        self.counters.reset();
    }

    /// Get all cached keys
    pub async fn keys(&self) -> Vec<String> {
        self.slots.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.len().await;
        self.counters.snapshot(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn counting(calls: &Arc<AtomicUsize>, value: u32) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<u32>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_second_read_is_a_hit() {
        let cache = LoaderCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get_or_load("k", counting(&calls, 1)).await.unwrap(), 1);
        assert_eq!(cache.get_or_load("k", counting(&calls, 2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek_state("k").await, Some(EntryState::Fresh));

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.loads, stats.entries), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = LoaderCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_load("k", counting(&calls, 1)).await.unwrap();
        assert!(cache.invalidate("k").await);
        assert_eq!(cache.peek_state("k").await, Some(EntryState::Stale));
        assert_eq!(cache.peek("k").await, Some(1));

        assert_eq!(cache.get_or_load("k", counting(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_key_is_noop() {
        let cache = LoaderCache::<u32>::default();
        assert!(!cache.invalidate("missing").await);
        assert!(cache.is_empty().await);
        assert_eq!(cache.stats().await.invalidations, 0);
    }

    #[tokio::test]
    async fn test_failure_without_value_leaves_no_entry() {
        let cache = LoaderCache::<u32>::default();
        let err = cache
            .get_or_load("k", || async { Err::<u32, _>(anyhow::anyhow!("db down")) })
            .await
            .unwrap_err();

        assert_eq!(err.key(), "k");
        assert_eq!(err.to_string(), "loader for `k` failed: db down");
        assert_eq!(cache.peek_state("k").await, None);
        assert_eq!(cache.stats().await.failures, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_value() {
        let cache = LoaderCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_load("k", counting(&calls, 1)).await.unwrap();
        cache.invalidate("k").await;

        let result = cache
            .get_or_load("k", || async { Err::<u32, _>(anyhow::anyhow!("timeout")) })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.peek("k").await, Some(1));
        assert_eq!(cache.peek_state("k").await, Some(EntryState::Stale));

        // Next read retries.
        assert_eq!(cache.get_or_load("k", counting(&calls, 3)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_panicking_loader_is_reported() {
        let cache = LoaderCache::<u32>::default();
        let err = cache
            .get_or_load("k", || async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                anyhow::Ok(0)
            })
            .await
            .unwrap_err();
        assert_eq!(err.error().to_string(), "loader panicked");
        assert_eq!(cache.peek_state("k").await, None);
    }

    #[tokio::test]
    async fn test_zero_max_age_always_reloads() {
        let cache = LoaderCache::new(LoaderConfig::default().with_max_age(Duration::ZERO));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_load("k", counting(&calls, 1)).await.unwrap();
        assert_eq!(cache.peek_state("k").await, Some(EntryState::Stale));
        cache.get_or_load("k", counting(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_prefix_and_clear() {
        let cache = LoaderCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["GET /blog", "GET /blog/a", "GET /about"] {
            cache.get_or_load(key, counting(&calls, 0)).await.unwrap();
        }

        assert_eq!(cache.invalidate_prefix("GET /blog").await, 2);
        assert_eq!(cache.peek_state("GET /about").await, Some(EntryState::Fresh));
        assert_eq!(cache.peek_state("GET /blog/a").await, Some(EntryState::Stale));

        assert_eq!(cache.invalidate_all().await, 3);

        cache.clear().await;
        assert!(cache.keys().await.is_empty());
        assert_eq!(cache.stats().await, CacheStats::default());
    }
}
