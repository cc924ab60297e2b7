//! # Query Cache
//!
//! Time-bound, size-bounded cache for read results.
//!
//! ## Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  get_or_fetch(key, ttl, fetch)                                          │
//! │       │                                                                 │
//! │       ├── entry present, same type, now - stored_at < ttl ──▶ clone     │
//! │       │                                                                 │
//! │       └── otherwise ──▶ fetch().await                                   │
//! │                             ├── Ok(v)  ──▶ store {v, now}, return v     │
//! │                             └── Err(e) ──▶ return e, store nothing      │
//! │                                                                         │
//! │  Inserting a new key at capacity evicts the least recently used entry.  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is never held across the fetch, so two concurrent misses on the
//! same key both fetch and the later write wins.

use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use stockroom_core::PageRequest;
use tracing::{debug, trace, warn};

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().expect("clock mutex poisoned");
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().expect("clock mutex poisoned")
    }
}

// =============================================================================
// Cache
// =============================================================================

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    /// Monotonic use counter for LRU ordering.
    tick: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

pub struct QueryCache {
    state: Mutex<CacheState>,
    capacity: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl QueryCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self::with_clock(capacity, default_ttl, Arc::new(SystemClock))
    }

    /// ## Arguments
    /// * `capacity` - entries kept; values below 1 are treated as 1
    /// * `default_ttl` - freshness window when a lookup passes no TTL
    /// * `clock` - time source for expiry
    pub fn with_clock(capacity: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        QueryCache {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            default_ttl,
            clock,
        }
    }

    /// Returns the cached value for `key` or runs `fetch` and caches its
    /// success.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let page = cache
    ///     .get_or_fetch("items:{...}", None, || db.items().list(&filter, page))
    ///     .await?;
    /// ```
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key, ttl) {
            trace!(key, "Cache hit");
            return Ok(hit);
        }

        debug!(key, "Cache miss");
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// [`get_or_fetch`](Self::get_or_fetch) when there is a key, a plain
    /// `fetch` otherwise. Pairs with [`cache_key`].
    pub async fn get_or_fetch_keyed<T, E, F, Fut>(
        &self,
        key: Option<&str>,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match key {
            Some(key) => self.get_or_fetch(key, ttl, fetch).await,
            None => fetch().await,
        }
    }

    /// Fresh value of type `T` under `key`, if any. Expired entries are
    /// dropped on the way.
    pub fn get<T>(&self, key: &str, ttl: Option<Duration>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = self.clock.now();
        let mut state = self.state.lock().expect("cache mutex poisoned");
        let tick = state.next_tick();

        let entry = state.entries.get_mut(key)?;
        if now.saturating_duration_since(entry.stored_at) >= ttl {
            state.entries.remove(key);
            return None;
        }

        let value = entry.value.downcast_ref::<T>()?.clone();
        entry.last_used = tick;
        Some(value)
    }

    /// Stores `value` under `key`, stamped with the current time.
    pub fn insert<T>(&self, key: &str, value: T)
    where
        T: Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("cache mutex poisoned");
        let tick = state.next_tick();

        if !state.entries.contains_key(key) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "Evicting least recently used entry");
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            key.to_string(),
            Entry {
                value: Arc::new(value),
                stored_at: now,
                last_used: tick,
            },
        );
    }

    /// Removes the given keys, or everything when `keys` is `None`.
    pub fn clear(&self, keys: Option<&[&str]>) {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        match keys {
            None => state.entries.clear(),
            Some(keys) => {
                for key in keys {
                    state.entries.remove(*key);
                }
            }
        }
    }

    /// Removes every key starting with `prefix`. Returns how many went.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut state = self.state.lock().expect("cache mutex poisoned");
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(prefix, removed, "Cache prefix invalidated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cache key for a filtered, paginated read: `"{prefix}:{json}"`.
///
/// `None` when the arguments do not serialize; such reads go straight to
/// the database rather than share a key.
pub fn cache_key<F: Serialize>(prefix: &str, filter: &F, page: PageRequest) -> Option<String> {
    match serde_json::to_string(&(filter, page)) {
        Ok(args) => Some(format!("{prefix}:{args}")),
        Err(e) => {
            warn!(prefix, error = %e, "Query arguments not serializable, bypassing cache");
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(capacity: usize) -> (QueryCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = QueryCache::with_clock(capacity, Duration::from_secs(300), clock.clone());
        (cache, clock)
    }

    async fn counted(calls: &AtomicUsize, value: u32) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_is_a_hit() {
        let (cache, clock) = cache(8);
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_fetch("k", None, || counted(&calls, 1)).await;
        clock.advance(Duration::from_secs(299));
        let second = cache.get_or_fetch("k", None, || counted(&calls, 2)).await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let (cache, clock) = cache(8);
        let calls = AtomicUsize::new(0);
        let ttl = Some(Duration::from_secs(10));

        cache.get_or_fetch("k", ttl, || counted(&calls, 1)).await.unwrap();
        clock.advance(Duration::from_secs(10));
        let value = cache.get_or_fetch("k", ttl, || counted(&calls, 2)).await;

        assert_eq!(value, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (cache, _) = cache(8);

        let failed: Result<u32, String> = cache
            .get_or_fetch("k", None, || async { Err("query timeout".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let ok: Result<u32, String> = cache.get_or_fetch("k", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let (cache, _) = cache(8);
        cache.insert("k", 5_u32);
        assert_eq!(cache.get::<String>("k", None), None);
        assert_eq!(cache.get::<u32>("k", None), Some(5));
    }

    #[test]
    fn test_lru_eviction() {
        let (cache, _) = cache(2);
        cache.insert("a", 1_u32);
        cache.insert("b", 2_u32);

        // Touch "a" so "b" becomes least recently used.
        assert_eq!(cache.get::<u32>("a", None), Some(1));
        cache.insert("c", 3_u32);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get::<u32>("b", None), None);
        assert_eq!(cache.get::<u32>("a", None), Some(1));
        assert_eq!(cache.get::<u32>("c", None), Some(3));
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let (cache, _) = cache(2);
        cache.insert("a", 1_u32);
        cache.insert("b", 2_u32);
        cache.insert("a", 10_u32);

        assert_eq!(cache.get::<u32>("a", None), Some(10));
        assert_eq!(cache.get::<u32>("b", None), Some(2));
    }

    #[test]
    fn test_clear_and_prefix() {
        let (cache, _) = cache(8);
        cache.insert("items:1", 1_u32);
        cache.insert("items:2", 2_u32);
        cache.insert("warehouses:1", 3_u32);

        assert_eq!(cache.invalidate_prefix("items:"), 2);
        assert_eq!(cache.len(), 1);

        cache.insert("a", 1_u32);
        cache.clear(Some(&["a", "missing"]));
        assert_eq!(cache.len(), 1);

        cache.clear(None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_includes_filter_and_page() {
        let a = cache_key("items", &("oil", 1), PageRequest::new(1, 20)).unwrap();
        let b = cache_key("items", &("oil", 1), PageRequest::new(2, 20)).unwrap();
        assert!(a.starts_with("items:"));
        assert_ne!(a, b);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no JSON form"))
        }
    }

    #[tokio::test]
    async fn test_unserializable_filter_bypasses_cache() {
        let key = cache_key("items", &Unserializable, PageRequest::new(1, 20));
        assert_eq!(key, None);

        let cache = QueryCache::new(8, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let value: Result<u32, ()> = cache
                .get_or_fetch_keyed(key.as_deref(), None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
