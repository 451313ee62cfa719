use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Cache, CacheKey, KeyGenerator};
use crate::artifact::Image;
use crate::error::ImageError;
use crate::handler::{Decorator, Handler};
use crate::params::Params;

/// Cache-aside pipeline stage.
///
/// Derives a key from the request parameters and serves the stored artifact
/// when present. On a miss the inner handler runs and its result is stored
/// before being returned. Cache faults never fail a request:
///
/// - a failing `get` counts as a miss
/// - an entry that fails to decode is deleted (best effort) and counts as a miss
/// - a failing `set` is logged and the freshly computed image is still returned
///
/// Inner handler errors propagate unchanged and nothing is cached.
///
/// By default concurrent misses for the same key each run the inner handler.
/// [`with_single_flight`](Self::with_single_flight) makes them share one
/// computation instead.
pub struct CachingDecorator {
    key_generator: Arc<dyn KeyGenerator>,
    cache: Arc<dyn Cache>,
    in_flight: Option<InFlight>,
}

impl CachingDecorator {
    pub fn new(key_generator: Arc<dyn KeyGenerator>, cache: Arc<dyn Cache>) -> Self {
        Self {
            key_generator,
            cache,
            in_flight: None,
        }
    }

    /// Deduplicate concurrent misses for the same key.
    ///
    /// The first miss becomes the leader and runs the inner handler. Other
    /// requests for that key wait until the leader finishes, then probe the
    /// cache again. If the leader failed or its result could not be cached,
    /// one of the waiters takes over as the next leader.
    pub fn with_single_flight(mut self) -> Self {
        self.in_flight = Some(InFlight::default());
        self
    }

    /// The key this stage uses for a parameter set.
    pub fn key_for(&self, params: &Params) -> CacheKey {
        self.key_generator.generate(params)
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Image> {
        let blob = match self.cache.get(key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, "Cache lookup failed, treating as miss: {}", e);
                return None;
            }
        };

        match Image::decode(&blob) {
            Ok(image) => {
                debug!(key = %key, format = image.format(), "cache hit");
                Some(image)
            }
            Err(e) => {
                warn!(key = %key, "Dropping undecodable cache entry: {}", e);
                if let Err(e) = self.cache.delete(key).await {
                    warn!(key = %key, "Failed to delete corrupt cache entry: {}", e);
                }
                None
            }
        }
    }

    async fn compute(
        &self,
        key: &CacheKey,
        params: &Params,
        inner: &dyn Handler,
    ) -> Result<Image, ImageError> {
        let image = inner.handle(params).await?;

        if let Err(e) = self.cache.set(key, image.encode()).await {
            warn!(key = %key, "Failed to store result in cache: {}", e);
        }

        Ok(image)
    }
}

#[async_trait]
impl Decorator for CachingDecorator {
    async fn decorate(&self, params: &Params, inner: &dyn Handler) -> Result<Image, ImageError> {
        let key = self.key_generator.generate(params);

        let Some(in_flight) = &self.in_flight else {
            if let Some(image) = self.lookup(&key).await {
                return Ok(image);
            }
            return self.compute(&key, params, inner).await;
        };

        loop {
            // Fast path: check cache
            if let Some(image) = self.lookup(&key).await {
                return Ok(image);
            }

            // Slow path: wait on the current leader or become one
            match in_flight.join(&key) {
                Flight::Follower(mut done) => {
                    // Resolves with Err once the leader's guard is dropped
                    let _ = done.changed().await;
                    continue;
                }
                Flight::Leader(_guard) => {
                    // A previous leader may have finished between our probe and join
                    if let Some(image) = self.lookup(&key).await {
                        return Ok(image);
                    }
                    return self.compute(&key, params, inner).await;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "cache"
    }
}

// =============================================================================
// Single-flight
// =============================================================================

/// Keys currently being computed, each with a channel closed on completion.
#[derive(Default)]
struct InFlight {
    waiters: Mutex<HashMap<CacheKey, watch::Receiver<()>>>,
}

enum Flight<'a> {
    Leader(FlightGuard<'a>),
    Follower(watch::Receiver<()>),
}

impl InFlight {
    fn join(&self, key: &CacheKey) -> Flight<'_> {
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(done) = waiters.get(key) {
            return Flight::Follower(done.clone());
        }

        let (tx, rx) = watch::channel(());
        waiters.insert(key.clone(), rx);
        Flight::Leader(FlightGuard {
            table: self,
            key: key.clone(),
            _done: tx,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held by the leader. Dropping it, on completion, failure or cancellation,
/// unregisters the key and closes the channel, waking every follower.
struct FlightGuard<'a> {
    table: &'a InFlight,
    key: CacheKey,
    _done: watch::Sender<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.table
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
