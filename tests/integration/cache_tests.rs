//! Cache behavior integration tests.
//!
//! Tests verify:
//! - Memory cache capacity and LRU eviction through the `Cache` trait
//! - Single-flight collapses concurrent identical misses
//! - Without single-flight, concurrent misses each compute

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use pixserve::cache::{Cache, CacheKey, CachingDecorator, MemoryCache, Sha256KeyGenerator};
use pixserve::handler::{Handler, Pipeline};
use pixserve::params::Params;
use pixserve::source::{ChainDetector, SourceOrigin};

use super::test_utils::{fixture_fetcher, DelayedFetcher};

fn key(name: &str) -> CacheKey {
    CacheKey::from_bytes(name.as_bytes().to_vec())
}

fn blob(size: usize) -> Bytes {
    Bytes::from(vec![0xA5u8; size])
}

// =============================================================================
// Memory Cache through the Cache trait
// =============================================================================

#[tokio::test]
async fn test_capacity_scenario() {
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(1024).unwrap());

    cache.set(&key("k1"), blob(600)).await.unwrap();
    cache.set(&key("k2"), blob(500)).await.unwrap();

    assert_eq!(cache.get(&key("k1")).await.unwrap(), None);
    assert_eq!(cache.get(&key("k2")).await.unwrap(), Some(blob(500)));
}

#[tokio::test]
async fn test_read_keeps_entry_alive() {
    let cache = MemoryCache::new(1000).unwrap();

    cache.set(&key("A"), blob(500)).await.unwrap();
    cache.set(&key("B"), blob(500)).await.unwrap();
    assert!(cache.get(&key("B")).await.unwrap().is_some());
    cache.set(&key("D"), blob(500)).await.unwrap();

    assert_eq!(cache.get(&key("A")).await.unwrap(), None);
    assert!(cache.get(&key("B")).await.unwrap().is_some());
    assert!(cache.get(&key("D")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_miss_after_delete_and_never_stored() {
    let cache = MemoryCache::new(1000).unwrap();

    assert_eq!(cache.get(&key("never")).await.unwrap(), None);

    cache.set(&key("gone"), blob(10)).await.unwrap();
    cache.delete(&key("gone")).await.unwrap();
    assert_eq!(cache.get(&key("gone")).await.unwrap(), None);

    // Deleting again is a no-op
    cache.delete(&key("gone")).await.unwrap();
    assert_eq!(cache.size().await, 0);
}

#[tokio::test]
async fn test_oversized_value_leaves_cache_unchanged() {
    let cache = MemoryCache::new(100).unwrap();
    cache.set(&key("small"), blob(60)).await.unwrap();

    let before = cache.stats().await;
    cache.set(&key("huge"), blob(101)).await.unwrap();
    let after = cache.stats().await;

    assert_eq!(after.entries, before.entries);
    assert_eq!(after.size, before.size);
    assert_eq!(after.evictions, before.evictions);
    assert_eq!(after.rejected, before.rejected + 1);
    assert!(cache.contains(&key("small")).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_holds_under_concurrent_churn() {
    let capacity = 8 * 1024;
    let cache = Arc::new(MemoryCache::new(capacity).unwrap());

    let mut handles = Vec::new();
    for task in 0..8usize {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for i in 0..200usize {
                let k = key(&format!("{}-{}", task, i % 17));
                match i % 5 {
                    0 => cache.delete(&k).await.unwrap(),
                    1 => {
                        cache.get(&k).await.unwrap();
                    }
                    _ => cache.set(&k, blob((task * 131 + i * 37) % 3000)).await.unwrap(),
                }
                assert!(cache.size().await <= capacity);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats().await;
    assert!(stats.size <= capacity);
    assert_eq!(stats.capacity, capacity);
}

// =============================================================================
// Single-flight
// =============================================================================

fn delayed_pipeline(fetcher: Arc<DelayedFetcher>, single_flight: bool) -> Arc<Pipeline> {
    let cache = Arc::new(MemoryCache::new(1024 * 1024).unwrap());
    let mut caching = CachingDecorator::new(Arc::new(Sha256KeyGenerator::new()), cache);
    if single_flight {
        caching = caching.with_single_flight();
    }
    Arc::new(
        Pipeline::origin(SourceOrigin::new(fetcher, ChainDetector::default())).wrap(caching),
    )
}

async fn run_concurrently(pipeline: Arc<Pipeline>, params: Params, count: usize) {
    let mut handles = Vec::new();
    for _ in 0..count {
        let pipeline = Arc::clone(&pipeline);
        let params = params.clone();
        handles.push(tokio::spawn(async move {
            pipeline.handle(&params).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().format(), "png");
    }
}

#[tokio::test]
async fn test_single_flight_computes_once() {
    let fetcher = Arc::new(DelayedFetcher::new(
        fixture_fetcher(),
        Duration::from_millis(100),
    ));
    let pipeline = delayed_pipeline(fetcher.clone(), true);

    run_concurrently(pipeline, Params::from([("source", "photos/cat.png")]), 16).await;

    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_single_flight_is_per_key() {
    let fetcher = Arc::new(DelayedFetcher::new(
        fixture_fetcher(),
        Duration::from_millis(50),
    ));
    let pipeline = delayed_pipeline(fetcher.clone(), true);

    let a = run_concurrently(
        pipeline.clone(),
        Params::from([("source", "photos/cat.png")]),
        4,
    );
    let b = run_concurrently(
        pipeline,
        Params::from([("source", "photos/cat.png")]).with("tag", 1),
        4,
    );
    tokio::join!(a, b);

    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn test_without_single_flight_misses_compute_independently() {
    let fetcher = Arc::new(DelayedFetcher::new(
        fixture_fetcher(),
        Duration::from_millis(100),
    ));
    let pipeline = delayed_pipeline(fetcher.clone(), false);

    run_concurrently(pipeline.clone(), Params::from([("source", "photos/cat.png")]), 8).await;
    assert_eq!(fetcher.call_count(), 8);

    // Once stored, later requests hit
    run_concurrently(pipeline, Params::from([("source", "photos/cat.png")]), 4).await;
    assert_eq!(fetcher.call_count(), 8);
}
