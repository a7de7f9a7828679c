//! Time-bounded response cache with single-flight fetching.
//!
//! [`ResponseCache`] stores opaque values keyed by [`CacheKey`]. A value is
//! fresh while its age is within the configured freshness window; stale
//! values are evicted lazily, on the next read that finds them.
//!
//! # Single-flight
//!
//! [`ResponseCache::fetch_with_dedup`] guarantees that at most one network
//! call is outstanding per key. The producer runs in its own tokio task, so
//! a caller that drops its future neither cancels the call nor leaves a
//! dangling registration behind: the call settles, stores its result and
//! releases the key regardless of who is still listening.
//!
//! # Ordering of settle
//!
//! A successful result is stored *before* its in-flight registration is
//! released, under the registry lock. A reader therefore never sees a
//! window in which the key has neither a value nor a call in flight.
//!
//! # Clear
//!
//! [`clear()`](ResponseCache::clear) bumps an epoch. Calls that started
//! before the clear still deliver their outcome to the callers waiting on
//! them, but their results are never written back into the cache.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::FutureExt;
use moka::sync::Cache;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::flight::{FlightRegistry, SharedFetch};
use crate::key::CacheKey;
use crate::sync::lock;
use crate::telemetry;
use crate::{HuginnError, Result};

/// Configuration for the response cache.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .freshness(Duration::from_secs(60))
///     .sweep_threshold(500);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age at which a stored value is still served. Default: 5 minutes.
    pub freshness: Duration,
    /// Entry count above which a `put` sweeps expired entries. Default: 100.
    pub sweep_threshold: u64,
    /// Hard capacity of the underlying store. Default: 10,000.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(5 * 60),
            sweep_threshold: 100,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness window.
    pub fn freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Set the entry count that triggers an expiry sweep.
    pub fn sweep_threshold(mut self, n: u64) -> Self {
        self.sweep_threshold = n;
        self
    }

    /// Set the hard capacity of the store.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }
}

/// Hit/miss counts for cache reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of reads that found a fresh value, `0.0` before any read.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, freshness: Duration) -> bool {
        self.stored_at.elapsed() <= freshness
    }
}

struct CacheInner<V> {
    entries: Cache<CacheKey, CacheEntry<V>>,
    flights: Mutex<FlightRegistry<V>>,
    freshness: Duration,
    sweep_threshold: u64,
    epoch: AtomicU64,
    next_flight: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// In-memory response cache with an in-flight request registry.
///
/// Cheap to clone; clones share the same store. Values are opaque to the
/// cache, which only requires them to be cloneable so that one result can
/// be handed to many callers.
pub struct ResponseCache<V = Value> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder().max_capacity(config.max_entries).build();
        Self {
            inner: Arc::new(CacheInner {
                entries,
                flights: Mutex::new(FlightRegistry::new()),
                freshness: config.freshness,
                sweep_threshold: config.sweep_threshold,
                epoch: AtomicU64::new(0),
                next_flight: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Look up a fresh value.
    ///
    /// A stale entry is evicted and reported as absent. Emits cache
    /// hit/miss metrics.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.inner.get(key)
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: CacheKey, value: V) {
        self.inner.store(key, value);
    }

    /// Return a fresh cached value, join the call already in flight for
    /// `key`, or start a new call with `producer`.
    ///
    /// `producer` is invoked at most once, and only when neither a fresh
    /// value nor an in-flight call exists. Its success is stored; its
    /// failure is delivered to every joined caller and leaves any existing
    /// entry untouched.
    ///
    /// `producer` runs after the key is registered and outside the registry
    /// lock, so it may itself read this cache (e.g. [`in_flight`](Self::in_flight)).
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context; the call runs in a spawned task.
    pub async fn fetch_with_dedup<F, Fut>(&self, key: &CacheKey, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        self.join_or_start(key, producer).await
    }

    /// Like [`fetch_with_dedup`](Self::fetch_with_dedup) but ignores any
    /// cached value: joins the in-flight call or starts a new one.
    pub async fn refresh_with_dedup<F, Fut>(&self, key: &CacheKey, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.join_or_start(key, producer).await
    }

    /// Await the call in flight for `key`, if any, without starting one.
    pub async fn join_in_flight(&self, key: &CacheKey) -> Option<Result<V>> {
        let outcome = self.inner.lock_flights().join(key)?;
        metrics::counter!(telemetry::DEDUP_JOINS_TOTAL).increment(1);
        debug!(key = %key, "joining in-flight request");
        Some(outcome.await)
    }

    /// Drop the entry for `key`, fresh or not.
    pub fn invalidate(&self, key: &CacheKey) {
        self.inner.entries.invalidate(key);
    }

    /// Drop every entry addressing `path` or a resource nested under it.
    pub fn invalidate_prefix(&self, path: &str) {
        let doomed: Vec<CacheKey> = self
            .inner
            .entries
            .iter()
            .filter(|(key, _)| key.is_under(path))
            .map(|(key, _)| (*key).clone())
            .collect();
        debug!(path, count = doomed.len(), "invalidating cached resources");
        for key in &doomed {
            self.inner.entries.invalidate(key);
        }
    }

    /// Wipe stored values and in-flight registrations.
    ///
    /// Calls already running keep their waiting callers but will not write
    /// their results back.
    pub fn clear(&self) {
        let mut flights = self.inner.lock_flights();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.entries.invalidate_all();
        flights.clear();
    }

    /// Number of stored entries, including stale ones not yet evicted.
    pub fn len(&self) -> u64 {
        self.inner.entries.run_pending_tasks();
        self.inner.entries.entry_count()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a network call in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.lock_flights().len()
    }

    /// Hit/miss counts since creation or the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
    }

    fn join_or_start<F, Fut>(&self, key: &CacheKey, producer: F) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (guard, epoch, reply, outcome) = {
            let mut flights = self.inner.lock_flights();
            if let Some(outcome) = flights.join(key) {
                metrics::counter!(telemetry::DEDUP_JOINS_TOTAL).increment(1);
                debug!(key = %key, "joining in-flight request");
                return outcome;
            }

            let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
            let epoch = self.inner.epoch.load(Ordering::SeqCst);
            let (reply, rx) = oneshot::channel();
            let outcome = rx
                .map(|received| {
                    received.unwrap_or_else(|_| {
                        Err(HuginnError::Cancelled("network call aborted".into()))
                    })
                })
                .boxed()
                .shared();
            flights.register(key.clone(), id, outcome.clone());
            let guard = FlightGuard {
                inner: Arc::clone(&self.inner),
                key: key.clone(),
                id,
            };
            (guard, epoch, reply, outcome)
        };

        // Registry lock released: the producer may use this cache.
        debug!(key = %key, "starting network call");
        let call = producer();
        tokio::spawn(async move {
            let result = call.await;
            guard.inner.settle(&guard.key, guard.id, epoch, &result);
            // Receivers are gone only if every caller gave up.
            let _ = reply.send(result);
        });
        outcome
    }
}

/// Registration of one running call. Dropping it releases the key, so a
/// producer or task that panics never leaves the key registered.
struct FlightGuard<V: Clone + Send + Sync + 'static> {
    inner: Arc<CacheInner<V>>,
    key: CacheKey,
    id: u64,
}

impl<V: Clone + Send + Sync + 'static> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        self.inner.lock_flights().release(&self.key, self.id);
    }
}

impl<V> Default for ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl<V> CacheInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn lock_flights(&self) -> MutexGuard<'_, FlightRegistry<V>> {
        lock(&self.flights)
    }

    fn get(&self, key: &CacheKey) -> Option<V> {
        let fresh = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(self.freshness) => Some(entry.value),
            Some(_) => {
                self.entries.invalidate(key);
                None
            }
            None => None,
        };
        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        }
        fresh
    }

    fn store(&self, key: CacheKey, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        self.entries.run_pending_tasks();
        if self.entries.entry_count() > self.sweep_threshold {
            self.sweep_expired();
        }
    }

    fn sweep_expired(&self) {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(self.freshness))
            .map(|(key, _)| (*key).clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        debug!(count = expired.len(), "sweeping expired cache entries");
        for key in &expired {
            self.entries.invalidate(key);
        }
    }

    fn settle(&self, key: &CacheKey, id: u64, epoch: u64, result: &Result<V>) {
        let mut flights = self.lock_flights();
        match result {
            Ok(value) if self.epoch.load(Ordering::SeqCst) == epoch => {
                self.store(key.clone(), value.clone());
            }
            Ok(_) => {
                debug!(key = %key, "discarding result of a call started before clear");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "network call failed");
            }
        }
        flights.release(key, id);
    }
}
