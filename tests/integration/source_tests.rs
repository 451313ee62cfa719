//! File-backed source tests.
//!
//! Tests verify:
//! - Images are read from a root directory and labelled by content
//! - Identifiers escaping the root are refused
//! - Detection falls back to the file extension

use std::sync::Arc;

use pixserve::cache::MemoryCache;
use pixserve::error::ErrorKind;
use pixserve::handler::{Handler, Origin};
use pixserve::params::{Params, Value};
use pixserve::source::{ChainDetector, ExtensionDetector, FileFetcher, HeaderDetector, SourceOrigin};

use super::test_utils::{
    create_test_jpeg, create_test_png, image_dimensions, is_valid_png, scratch_dir,
    standard_pipeline,
};

#[tokio::test]
async fn test_file_pipeline_end_to_end() {
    let root = scratch_dir("e2e");
    std::fs::create_dir_all(root.join("originals")).unwrap();
    std::fs::write(root.join("originals/scan.jpg"), create_test_jpeg(60, 30)).unwrap();

    let cache = Arc::new(MemoryCache::new(1024 * 1024).unwrap());
    let pipeline = standard_pipeline(FileFetcher::new(&root), cache.clone());

    let params = Params::from([
        ("source", Value::from("originals/scan.jpg")),
        ("height", Value::from(10)),
        ("format", Value::from("png")),
    ]);
    let image = pipeline.handle(&params).await.unwrap();

    assert_eq!(image.format(), "png");
    assert!(is_valid_png(image.data()));
    assert_eq!(image_dimensions(image.data()), (20, 10));

    // Served from cache even after the file is gone
    std::fs::remove_file(root.join("originals/scan.jpg")).unwrap();
    let again = pipeline.handle(&params).await.unwrap();
    assert_eq!(again, image);

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_escaping_identifier_refused() {
    let root = scratch_dir("escape");
    let inner = root.join("public");
    std::fs::create_dir_all(&inner).unwrap();
    std::fs::write(root.join("secret.png"), create_test_png(4, 4)).unwrap();

    let origin = SourceOrigin::new(FileFetcher::new(&inner), HeaderDetector);

    for identifier in ["../secret.png", "/etc/hostname"] {
        let err = origin
            .produce(&Params::from([("source", identifier)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Source, "{}", identifier);
    }

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_extension_fallback_for_unrecognized_header() {
    let root = scratch_dir("fallback");
    std::fs::write(root.join("blob.png"), b"not really a png").unwrap();
    std::fs::write(root.join("blob.bin"), b"not really a png").unwrap();

    let origin = SourceOrigin::new(FileFetcher::new(&root), ChainDetector::default());

    let image = origin
        .produce(&Params::from([("source", "blob.png")]))
        .await
        .unwrap();
    assert_eq!(image.format(), "png");

    let err = origin
        .produce(&Params::from([("source", "blob.bin")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Param);
    assert_eq!(err.param_name(), Some("source"));

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_extension_detector_trusts_name() {
    let root = scratch_dir("extension");
    std::fs::write(root.join("photo.jpeg"), create_test_png(4, 4)).unwrap();

    let origin = SourceOrigin::new(FileFetcher::new(&root), ExtensionDetector);
    let image = origin
        .produce(&Params::from([("source", "photo.jpeg")]))
        .await
        .unwrap();
    assert_eq!(image.format(), "jpeg");

    std::fs::remove_dir_all(&root).unwrap();
}
