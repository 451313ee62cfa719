//! # pixserve
//!
//! A composable image request pipeline with a content-addressed cache.
//!
//! A request is a flat [`Params`] set (which source to fetch, how to resize
//! and re-encode it). The pipeline turns it into an [`Image`], caching the
//! result so identical requests skip the expensive work.
//!
//! ## Features
//!
//! - **Uniform stages**: every stage is a [`Handler`]; stages are either an
//!   [`Origin`] or a [`Decorator`] wrapping one inner handler
//! - **Canonical cache keys**: parameter sets hash to the same digest however
//!   they were assembled
//! - **Bounded memory cache**: byte-capacity LRU with eviction statistics
//! - **Cache-aside decorator**: cache faults degrade to misses, optional
//!   single-flight for concurrent identical requests
//! - **Reference stages**: file/S3/in-memory sources and an `image`-crate
//!   resize and re-encode processor
//!
//! ## Architecture
//!
//! - [`params`] - Parameter sets and their canonical encoding
//! - [`artifact`] - Image artifacts and their cache encoding
//! - [`handler`] - Handler contract and pipeline composition
//! - [`cache`] - Cache trait, key generation, memory cache, caching decorator
//! - [`source`] - Source origin and fetchers
//! - [`process`] - Processing stage and image processor
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pixserve::{
//!     CachingDecorator, ChainDetector, FileFetcher, Handler, ImageProcessor, MemoryCache, Params,
//!     Pipeline, ProcessStage, Sha256KeyGenerator, SourceOrigin, Value,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(MemoryCache::new(64 * 1024 * 1024).unwrap());
//!     let pipeline = Pipeline::origin(SourceOrigin::new(
//!         FileFetcher::new("/srv/images"),
//!         ChainDetector::default(),
//!     ))
//!     .wrap(ProcessStage::new(ImageProcessor::new()))
//!     .wrap(CachingDecorator::new(Arc::new(Sha256KeyGenerator::new()), cache));
//!
//!     let params = Params::from([
//!         ("source", Value::from("cats/tabby.png")),
//!         ("width", Value::from(320)),
//!         ("format", Value::from("jpeg")),
//!     ]);
//!     let image = pipeline.handle(&params).await.unwrap();
//!     println!("{} bytes of {}", image.len(), image.format());
//! }
//! ```

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod params;
pub mod process;
pub mod source;

// Re-export commonly used types
pub use artifact::{Image, MAX_FORMAT_LEN};
pub use cache::{
    Cache, CacheKey, CacheStats, CachingDecorator, KeyGenerator, KeyGeneratorFn, MemoryCache,
    ParamsHashKeyGenerator, Sha256KeyGenerator, Sha512KeyGenerator,
    DEFAULT_MEMORY_CACHE_CAPACITY,
};
pub use config::{parse_size, Cli, Command, KeyConfig, RenderConfig};
pub use error::{CacheError, ConfigError, DetectError, ErrorKind, FetchError, ImageError};
pub use handler::{Decorator, Handler, Origin, Pipeline};
pub use params::{Params, Value};
pub use process::{ImageProcessor, ProcessStage, Processor};
pub use source::{
    create_s3_client, ChainDetector, ExtensionDetector, Fetcher, FileFetcher, FormatDetector,
    HeaderDetector, MemoryFetcher, S3Fetcher, SourceOrigin, SOURCE_PARAM,
};
