//! End-to-end pipeline tests.
//!
//! Tests verify:
//! - Cache-aside: repeat requests skip the source and processing
//! - Errors keep their kind through every stage and are never cached
//! - Cache faults degrade to misses without failing requests

use std::sync::Arc;

use pixserve::cache::{CachingDecorator, MemoryCache, Sha256KeyGenerator};
use pixserve::error::ErrorKind;
use pixserve::handler::{Handler, Pipeline};
use pixserve::params::{Params, Value};
use pixserve::process::{ImageProcessor, ProcessStage};
use pixserve::source::{ChainDetector, MemoryFetcher, SourceOrigin};

use super::test_utils::{
    fixture_fetcher, image_dimensions, is_valid_jpeg, is_valid_png, standard_pipeline, FlakyCache,
};

fn request(source: &str) -> Params {
    Params::from([("source", source)])
}

// =============================================================================
// Cache-aside
// =============================================================================

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let fetcher = Arc::new(fixture_fetcher());
    let cache = Arc::new(MemoryCache::new(1024 * 1024).unwrap());
    let pipeline = standard_pipeline(fetcher.clone(), cache.clone());

    let params = request("photos/cat.png").with("width", 32);
    let first = pipeline.handle(&params).await.unwrap();
    let second = pipeline.handle(&params).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fetcher.fetch_count(), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_resize_and_convert() {
    let pipeline = standard_pipeline(
        fixture_fetcher(),
        Arc::new(MemoryCache::new(1024 * 1024).unwrap()),
    );

    let params = Params::from([
        ("source", Value::from("photos/cat.png")),
        ("width", Value::from(16)),
        ("format", Value::from("jpeg")),
        ("quality", Value::from(70)),
    ]);
    let image = pipeline.handle(&params).await.unwrap();

    assert_eq!(image.format(), "jpeg");
    assert!(is_valid_jpeg(image.data()));
    assert_eq!(image_dimensions(image.data()), (16, 8));
}

#[tokio::test]
async fn test_passthrough_returns_source_bytes() {
    let pipeline = standard_pipeline(
        fixture_fetcher(),
        Arc::new(MemoryCache::new(1024 * 1024).unwrap()),
    );

    let image = pipeline.handle(&request("photos/dog.jpg")).await.unwrap();

    assert_eq!(image.format(), "jpeg");
    assert_eq!(image.data().as_ref(), &fixture_bytes("photos/dog.jpg")[..]);
}

#[tokio::test]
async fn test_processing_params_produce_distinct_entries() {
    let fetcher = Arc::new(fixture_fetcher());
    let cache = Arc::new(MemoryCache::new(1024 * 1024).unwrap());
    let pipeline = standard_pipeline(fetcher.clone(), cache.clone());

    let small = pipeline
        .handle(&request("photos/cat.png").with("width", 8))
        .await
        .unwrap();
    let large = pipeline
        .handle(&request("photos/cat.png").with("width", 48))
        .await
        .unwrap();

    assert!(is_valid_png(small.data()));
    assert_eq!(image_dimensions(small.data()), (8, 4));
    assert_eq!(image_dimensions(large.data()), (48, 24));
    assert_eq!(fetcher.fetch_count(), 2);
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn test_eviction_forces_recomputation() {
    let fetcher = Arc::new(fixture_fetcher());
    let png_len = fixture_bytes("photos/cat.png").len();
    let jpeg_len = fixture_bytes("photos/dog.jpg").len();
    // Room for either passthrough entry but not both
    let capacity = png_len.max(jpeg_len) + 64;
    let cache = Arc::new(MemoryCache::new(capacity).unwrap());
    let pipeline = standard_pipeline(fetcher.clone(), cache.clone());

    pipeline.handle(&request("photos/cat.png")).await.unwrap();
    pipeline.handle(&request("photos/dog.jpg")).await.unwrap();
    pipeline.handle(&request("photos/cat.png")).await.unwrap();

    assert_eq!(fetcher.fetch_count(), 3);
    assert!(cache.size().await <= capacity);
    assert!(cache.stats().await.evictions >= 1);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_missing_source_param() {
    let pipeline = standard_pipeline(
        fixture_fetcher(),
        Arc::new(MemoryCache::new(1024).unwrap()),
    );

    let err = pipeline.handle(&Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Param);
    assert_eq!(err.param_name(), Some("source"));
}

#[tokio::test]
async fn test_unknown_source_is_source_error() {
    let pipeline = standard_pipeline(
        fixture_fetcher(),
        Arc::new(MemoryCache::new(1024).unwrap()),
    );

    let err = pipeline
        .handle(&request("photos/missing.png"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Source);
    assert_eq!(err.param_name(), None);
}

#[tokio::test]
async fn test_invalid_param_not_cached() {
    let fetcher = Arc::new(fixture_fetcher());
    let cache = Arc::new(MemoryCache::new(1024 * 1024).unwrap());
    let pipeline = standard_pipeline(fetcher.clone(), cache.clone());

    let params = request("photos/cat.png").with("width", 0);
    for _ in 0..2 {
        let err = pipeline.handle(&params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Param);
        assert_eq!(err.param_name(), Some("width"));
        assert!(err.message().starts_with("image: "));
    }

    assert!(cache.is_empty().await);
    assert_eq!(fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_undecodable_source_is_processing_error() {
    let fetcher = MemoryFetcher::new().with("broken.png", vec![0x89, b'P', b'N', b'G', 0, 0]);
    let pipeline = standard_pipeline(fetcher, Arc::new(MemoryCache::new(1024).unwrap()));

    let err = pipeline
        .handle(&request("broken.png").with("width", 4))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Processing);
}

// =============================================================================
// Cache Faults
// =============================================================================

#[tokio::test]
async fn test_cache_get_failure_is_a_miss() {
    let fetcher = Arc::new(fixture_fetcher());
    let cache = Arc::new(FlakyCache::new().failing_get());
    let pipeline = standard_pipeline(fetcher.clone(), cache.clone());

    for _ in 0..3 {
        let image = pipeline.handle(&request("photos/cat.png")).await.unwrap();
        assert_eq!(image.format(), "png");
    }

    assert_eq!(fetcher.fetch_count(), 3);
    assert_eq!(cache.get_calls(), 3);
}

#[tokio::test]
async fn test_cache_set_failure_still_returns_image() {
    let fetcher = Arc::new(fixture_fetcher());
    let cache = Arc::new(FlakyCache::new().failing_set());
    let pipeline = standard_pipeline(fetcher.clone(), cache.clone());

    let image = pipeline.handle(&request("photos/dog.jpg")).await.unwrap();
    assert_eq!(image.format(), "jpeg");
    assert_eq!(cache.set_calls(), 1);
    assert!(cache.inner().is_empty().await);

    pipeline.handle(&request("photos/dog.jpg")).await.unwrap();
    assert_eq!(fetcher.fetch_count(), 2);
}

// =============================================================================
// Composition
// =============================================================================

#[tokio::test]
async fn test_stage_order() {
    let pipeline = standard_pipeline(
        fixture_fetcher(),
        Arc::new(MemoryCache::new(1024).unwrap()),
    );
    assert_eq!(pipeline.depth(), 3);
    assert_eq!(pipeline.stage_names(), vec!["cache", "image", "source"]);
}

#[tokio::test]
async fn test_namespaces_separate_pipelines_sharing_a_cache() {
    let cache = Arc::new(MemoryCache::new(1024 * 1024).unwrap());

    let raw = Pipeline::origin(SourceOrigin::new(fixture_fetcher(), ChainDetector::default()))
        .wrap(CachingDecorator::new(
            Arc::new(Sha256KeyGenerator::new().with_namespace("raw")),
            cache.clone(),
        ));
    let processed = Pipeline::origin(SourceOrigin::new(fixture_fetcher(), ChainDetector::default()))
        .wrap(ProcessStage::new(ImageProcessor::new()))
        .wrap(CachingDecorator::new(
            Arc::new(Sha256KeyGenerator::new().with_namespace("processed")),
            cache.clone(),
        ));

    let params = request("photos/cat.png").with("format", "jpeg");
    let a = raw.handle(&params).await.unwrap();
    let b = processed.handle(&params).await.unwrap();

    assert_eq!(a.format(), "png");
    assert_eq!(b.format(), "jpeg");
    assert_eq!(cache.len().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_with_different_params() {
    let fetcher = Arc::new(fixture_fetcher());
    let cache = Arc::new(MemoryCache::new(4 * 1024 * 1024).unwrap());
    let pipeline = Arc::new(standard_pipeline(fetcher.clone(), cache.clone()));

    let mut handles = Vec::new();
    for width in 1..=12i64 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let params = request("photos/cat.png").with("width", width * 4);
            let image = pipeline.handle(&params).await.unwrap();
            (width, image)
        }));
    }

    for handle in handles {
        let (width, image) = handle.await.unwrap();
        assert_eq!(image_dimensions(image.data()).0, (width * 4) as u32);
    }
    assert_eq!(cache.len().await, 12);
}

fn fixture_bytes(identifier: &str) -> Vec<u8> {
    match identifier {
        "photos/cat.png" => super::test_utils::create_test_png(64, 32),
        "photos/dog.jpg" => super::test_utils::create_test_jpeg(40, 40),
        other => panic!("no fixture named {}", other),
    }
}
