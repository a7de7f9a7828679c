//! Tests for [`ResponseCache`]: freshness, single-flight and clear.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use huginn::cache::{CacheConfig, ResponseCache};
use huginn::{CacheKey, HuginnError, Params};

fn key(path: &str) -> CacheKey {
    CacheKey::new(path, &Params::new()).unwrap()
}

/// Producer that counts invocations and resolves to `value` after `delay`.
fn counted(
    calls: &Arc<AtomicUsize>,
    delay: Duration,
    value: &'static str,
) -> impl FnOnce() -> BoxFuture<'static, huginn::Result<String>> + Send + use<> {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(delay).await;
            Ok(value.to_string())
        }
        .boxed()
    }
}

fn failing(
    calls: &Arc<AtomicUsize>,
    delay: Duration,
) -> impl FnOnce() -> BoxFuture<'static, huginn::Result<String>> + Send + use<> {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(delay).await;
            Err(HuginnError::Api {
                status: 503,
                message: "unavailable".into(),
            })
        }
        .boxed()
    }
}

// =========================================================================
// CacheConfig
// =========================================================================

#[test]
fn cache_config_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.freshness, Duration::from_secs(300));
    assert_eq!(config.sweep_threshold, 100);
    assert_eq!(config.max_entries, 10_000);
}

#[test]
fn cache_config_builder() {
    let config = CacheConfig::new()
        .freshness(Duration::from_secs(60))
        .sweep_threshold(10)
        .max_entries(500);
    assert_eq!(config.freshness, Duration::from_secs(60));
    assert_eq!(config.sweep_threshold, 10);
    assert_eq!(config.max_entries, 500);
}

// =========================================================================
// Freshness
// =========================================================================

#[tokio::test(start_paused = true)]
async fn value_is_fresh_until_the_window_closes() {
    let cache: ResponseCache<String> = ResponseCache::default();
    cache.put(key("/rooms"), "rooms".into());

    tokio::time::advance(Duration::from_secs(4 * 60 + 59)).await;
    assert_eq!(cache.get(&key("/rooms")).as_deref(), Some("rooms"));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(cache.get(&key("/rooms")).is_none());
    // The stale read evicted the entry.
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_value_triggers_a_new_call() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache
        .fetch_with_dedup(&key("/rooms"), counted(&calls, Duration::ZERO, "v1"))
        .await;
    assert_eq!(first.as_deref(), Ok("v1"));

    let cached = cache
        .fetch_with_dedup(&key("/rooms"), counted(&calls, Duration::ZERO, "v2"))
        .await;
    assert_eq!(cached.as_deref(), Ok("v1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(301)).await;
    let refreshed = cache
        .fetch_with_dedup(&key("/rooms"), counted(&calls, Duration::ZERO, "v2"))
        .await;
    assert_eq!(refreshed.as_deref(), Ok("v2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn put_past_threshold_sweeps_expired_entries() {
    let cache: ResponseCache<String> = ResponseCache::new(
        &CacheConfig::new()
            .freshness(Duration::from_secs(10))
            .sweep_threshold(3),
    );
    for i in 0..3 {
        cache.put(key(&format!("/old/{i}")), "old".into());
    }
    tokio::time::advance(Duration::from_secs(11)).await;

    cache.put(key("/new"), "new".into());
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&key("/new")).as_deref(), Some("new"));
}

// =========================================================================
// Single-flight
// =========================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_call() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/rooms/12");

    let fetches = (0..10).map(|_| {
        cache.fetch_with_dedup(&k, counted(&calls, Duration::from_millis(50), "room"))
    });
    let results = join_all(fetches).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| r.as_deref() == Ok("room")));
    assert_eq!(cache.in_flight(), 0);
    assert_eq!(cache.get(&k).as_deref(), Some("room"));
}

#[tokio::test(start_paused = true)]
async fn failure_reaches_every_joined_caller() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/rooms");

    let fetches =
        (0..3).map(|_| cache.fetch_with_dedup(&k, failing(&calls, Duration::from_millis(20))));
    let results = join_all(fetches).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert!(matches!(result, Err(HuginnError::Api { status: 503, .. })));
    }
    assert_eq!(cache.in_flight(), 0);
    assert!(cache.get(&k).is_none());

    // Nothing is retried; the next caller starts a fresh call.
    let retry = cache
        .fetch_with_dedup(&k, counted(&calls, Duration::ZERO, "ok"))
        .await;
    assert_eq!(retry.as_deref(), Ok("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_existing_entry() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/stats");
    cache.put(k.clone(), "previous".into());

    let result = cache
        .refresh_with_dedup(&k, failing(&calls, Duration::ZERO))
        .await;
    assert!(result.is_err());
    assert_eq!(cache.get(&k).as_deref(), Some("previous"));
}

#[tokio::test(start_paused = true)]
async fn refresh_ignores_fresh_value() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/stats");
    cache.put(k.clone(), "previous".into());

    let result = cache
        .refresh_with_dedup(&k, counted(&calls, Duration::ZERO, "current"))
        .await;
    assert_eq!(result.as_deref(), Ok("current"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get(&k).as_deref(), Some("current"));
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_does_not_leak_registration() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/rooms");

    let caller = {
        let cache = cache.clone();
        let k = k.clone();
        let producer = counted(&calls, Duration::from_millis(100), "room");
        tokio::spawn(async move { cache.fetch_with_dedup(&k, producer).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(cache.in_flight(), 1);

    caller.abort();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.in_flight(), 0);
    assert_eq!(cache.get(&k).as_deref(), Some("room"));
}

#[tokio::test]
async fn producer_may_read_the_cache() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let k = key("/rooms");

    let inner = cache.clone();
    let result = cache
        .fetch_with_dedup(&k, move || {
            let running = inner.in_flight();
            async move { Ok(running.to_string()) }.boxed()
        })
        .await;

    assert_eq!(result.as_deref(), Ok("1"));
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test]
async fn panicking_producer_releases_its_key() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/rooms");

    let attempt = std::panic::AssertUnwindSafe(cache.fetch_with_dedup(
        &k,
        || -> BoxFuture<'static, huginn::Result<String>> { panic!("producer exploded") },
    ))
    .catch_unwind()
    .await;
    assert!(attempt.is_err());
    assert_eq!(cache.in_flight(), 0);

    let result = cache
        .fetch_with_dedup(&k, counted(&calls, Duration::ZERO, "room"))
        .await;
    assert_eq!(result.as_deref(), Ok("room"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Clear and invalidation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn clear_during_flight_discards_old_result() {
    let cache: ResponseCache<String> = ResponseCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("/rooms");

    let old_caller = {
        let cache = cache.clone();
        let k = k.clone();
        let producer = counted(&calls, Duration::from_millis(100), "old");
        tokio::spawn(async move { cache.fetch_with_dedup(&k, producer).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(cache.in_flight(), 1);

    cache.clear();
    assert_eq!(cache.in_flight(), 0);

    // A call after clear does not join the old one.
    let fresh = cache
        .fetch_with_dedup(&k, counted(&calls, Duration::from_millis(50), "new"))
        .await;
    assert_eq!(fresh.as_deref(), Ok("new"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // The old caller still gets its own outcome...
    assert_eq!(old_caller.await.unwrap().as_deref(), Ok("old"));
    // ...but it never overwrites the store.
    assert_eq!(cache.get(&k).as_deref(), Some("new"));
}

#[tokio::test]
async fn invalidate_prefix_drops_nested_entries_only() {
    let cache: ResponseCache<String> = ResponseCache::default();
    for path in ["/rooms", "/rooms/1", "/rooms/1/photos", "/roomservice", "/bookings"] {
        cache.put(key(path), path.to_string());
    }
    let filtered = CacheKey::new("/rooms", &Params::new().with("city", "Oslo")).unwrap();
    cache.put(filtered.clone(), "oslo".into());

    cache.invalidate_prefix("/rooms");

    assert!(cache.get(&key("/rooms")).is_none());
    assert!(cache.get(&key("/rooms/1")).is_none());
    assert!(cache.get(&key("/rooms/1/photos")).is_none());
    assert!(cache.get(&filtered).is_none());
    assert!(cache.get(&key("/roomservice")).is_some());
    assert!(cache.get(&key("/bookings")).is_some());
}

#[tokio::test]
async fn stats_track_hits_and_misses() {
    let cache: ResponseCache<String> = ResponseCache::default();
    assert!(cache.get(&key("/rooms")).is_none());
    cache.put(key("/rooms"), "rooms".into());
    assert!(cache.get(&key("/rooms")).is_some());
    assert!(cache.get(&key("/rooms")).is_some());

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);

    cache.reset_stats();
    assert_eq!(cache.stats().hit_rate(), 0.0);
}
