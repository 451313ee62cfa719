use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::Fetcher;
use crate::error::FetchError;

/// Fetcher serving objects from an in-memory map.
///
/// Useful for fixtures and for embedding a small, fixed image set.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    objects: HashMap<String, Bytes>,
    fetches: AtomicU64,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, replacing any previous one under the same identifier.
    pub fn with(mut self, identifier: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(identifier, data);
        self
    }

    pub fn insert(&mut self, identifier: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.insert(identifier.into(), data.into());
    }

    /// Number of fetch calls served so far, successful or not.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, identifier: &str) -> Result<Bytes, FetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.objects
            .get(identifier)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(identifier.to_string()))
    }
}
