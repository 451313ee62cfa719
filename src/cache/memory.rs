//! Byte-bounded in-memory LRU cache.
//!
//! Entries live in an arena (`Vec` of slots) and are linked into a
//! recency list by slot index:
//!
//! ```text
//!   head (MRU)                                   tail (LRU)
//!      │                                             │
//!      ▼                                             ▼
//!   ┌──────┐  next  ┌──────┐  next  ┌──────┐  next  ┌──────┐
//!   │ slot │ ─────▶ │ slot │ ─────▶ │ slot │ ─────▶ │ slot │
//!   │  3   │ ◀───── │  0   │ ◀───── │  5   │ ◀───── │  1   │
//!   └──────┘  prev  └──────┘  prev  └──────┘  prev  └──────┘
//! ```
//!
//! A `HashMap<CacheKey, usize>` maps keys to slots, and vacated slots are kept
//! on a free list for reuse. Every `get` hit and every `set` moves the entry
//! to the head; eviction pops from the tail.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of stored values in bytes. Storing a value
//! evicts least-recently-used entries until it fits. A value larger than the
//! whole capacity is not stored at all.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Cache, CacheKey};
use crate::error::{CacheError, ConfigError};

/// Default cache capacity: 64MB
pub const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Stores refused because the value exceeded the capacity
    pub rejected: u64,
    pub entries: usize,
    /// Total stored bytes
    pub size: usize,
    pub capacity: usize,
}

// =============================================================================
// LRU State
// =============================================================================

struct Entry {
    key: CacheKey,
    data: Bytes,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Everything mutated by a cache operation, guarded by one lock.
#[derive(Default)]
struct LruState {
    slots: Vec<Option<Entry>>,
    free: Vec<usize>,
    index: HashMap<CacheKey, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    total: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    rejected: u64,
}

impl LruState {
    fn entry(&self, idx: usize) -> Option<&Entry> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, idx: usize) -> Option<&mut Entry> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Detach a slot from the recency list.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.entry(idx) {
            Some(entry) => (entry.prev, entry.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(entry) = self.entry_mut(p) {
                    entry.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(entry) = self.entry_mut(n) {
                    entry.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(entry) = self.entry_mut(idx) {
            entry.prev = None;
            entry.next = None;
        }
    }

    /// Attach a detached slot at the most-recently-used end.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(entry) = self.entry_mut(idx) {
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(entry) = self.entry_mut(h) {
                    entry.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn insert(&mut self, key: CacheKey, data: Bytes) {
        self.total += data.len();
        let entry = Entry {
            key: key.clone(),
            data,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                idx
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    fn remove_slot(&mut self, idx: usize) -> Option<Entry> {
        self.unlink(idx);
        let entry = self.slots.get_mut(idx).and_then(Option::take)?;
        self.index.remove(&entry.key);
        self.free.push(idx);
        self.total -= entry.data.len();
        Some(entry)
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Entry> {
        let idx = *self.index.get(key)?;
        self.remove_slot(idx)
    }

    fn pop_lru(&mut self) -> Option<Entry> {
        let idx = self.tail?;
        self.remove_slot(idx)
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.total = 0;
    }
}

// =============================================================================
// Memory Cache
// =============================================================================

/// In-memory LRU cache bounded by total stored bytes.
///
/// # Thread Safety
///
/// Each operation runs entirely under one internal lock, so a lookup that
/// promotes an entry and a store that evicts are atomic with respect to each
/// other. Share across tasks via `Arc`.
///
/// # Example
///
/// ```
/// use pixserve::cache::{Cache, CacheKey, MemoryCache};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryCache::new(1024).unwrap();
///     let k1 = CacheKey::from_bytes(vec![1]);
///     let k2 = CacheKey::from_bytes(vec![2]);
///
///     cache.set(&k1, Bytes::from(vec![0u8; 600])).await.unwrap();
///     cache.set(&k2, Bytes::from(vec![0u8; 500])).await.unwrap();
///
///     // k1 was evicted to make room for k2
///     assert_eq!(cache.get(&k1).await.unwrap(), None);
///     assert_eq!(cache.get(&k2).await.unwrap().map(|b| b.len()), Some(500));
/// }
/// ```
pub struct MemoryCache {
    state: Mutex<LruState>,
    capacity: usize,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` bytes of values.
    ///
    /// A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                option: "cache capacity",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            state: Mutex::new(LruState::default()),
            capacity,
        })
    }

    /// Check whether a key is cached without updating LRU order.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().await.index.contains_key(key)
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.index.is_empty()
    }

    /// Total size of cached values in bytes.
    pub async fn size(&self) -> usize {
        self.state.lock().await.total
    }

    /// Maximum total size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove all entries. Counters are kept.
    pub async fn clear(&self) {
        self.state.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            rejected: state.rejected,
            entries: state.index.len(),
            size: state.total,
            capacity: self.capacity,
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        let mut state = self.state.lock().await;
        let Some(&idx) = state.index.get(key) else {
            state.misses += 1;
            return Ok(None);
        };

        state.touch(idx);
        state.hits += 1;
        Ok(state.entry(idx).map(|entry| entry.data.clone()))
    }

    async fn set(&self, key: &CacheKey, data: Bytes) -> Result<(), CacheError> {
        let size = data.len();
        if size > self.capacity {
            let mut state = self.state.lock().await;
            state.rejected += 1;
            debug!(
                "Not caching {}: {} bytes exceeds capacity of {} bytes",
                key, size, self.capacity
            );
            return Ok(());
        }

        let mut state = self.state.lock().await;

        // Replacing an entry releases its old size first
        state.remove(key);

        while state.total + size > self.capacity {
            match state.pop_lru() {
                Some(evicted) => {
                    state.evictions += 1;
                    debug!("Evicted {} ({} bytes)", evicted.key, evicted.data.len());
                }
                None => break,
            }
        }

        state.insert(key.clone(), data);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.state.lock().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
