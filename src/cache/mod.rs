//! Content-addressed caching.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               CachingDecorator               │
//! │  ┌──────────────┐        ┌────────────────┐  │
//! │  │ KeyGenerator │        │  dyn Cache     │  │
//! │  │ (params →    │  key   │  (key → blob)  │  │
//! │  │  digest)     │ ─────▶ │                │  │
//! │  └──────────────┘        └────────────────┘  │
//! └──────────────────────┬───────────────────────┘
//!                        │ miss
//!                        ▼
//!                  inner Handler
//! ```
//!
//! # Components
//!
//! - [`Cache`]: get/set/delete contract over a key → bytes store
//! - [`MemoryCache`]: byte-bounded in-memory LRU implementation
//! - [`KeyGenerator`] / [`ParamsHashKeyGenerator`]: digest of a parameter set
//! - [`CachingDecorator`]: cache-aside request handler stage
//!
//! # Example
//!
//! ```
//! use pixserve::cache::{Cache, KeyGenerator, MemoryCache, Sha256KeyGenerator};
//! use pixserve::params::Params;
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = MemoryCache::new(1024 * 1024).unwrap();
//!     let key = Sha256KeyGenerator::new().generate(&Params::from([("source", "cat.png")]));
//!
//!     cache.set(&key, Bytes::from_static(b"blob")).await.unwrap();
//!     assert_eq!(cache.get(&key).await.unwrap(), Some(Bytes::from_static(b"blob")));
//! }
//! ```

mod handler;
mod key;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;

pub use handler::CachingDecorator;
pub use key::{
    CacheKey, KeyGenerator, KeyGeneratorFn, ParamsHashKeyGenerator, Sha256KeyGenerator,
    Sha512KeyGenerator,
};
pub use memory::{CacheStats, MemoryCache, DEFAULT_MEMORY_CACHE_CAPACITY};

/// A key → bytes store.
///
/// A miss is `Ok(None)`, never an error. Errors are reserved for storage
/// faults of the backend.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up an entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError>;

    /// Store an entry, overwriting any existing entry under the same key.
    async fn set(&self, key: &CacheKey, data: Bytes) -> Result<(), CacheError>;

    /// Remove an entry. Removing an absent key is a no-op.
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;
}
