//! Capacity- and time-bounded query response cache.
//!
//! Entries are keyed by [`compute_cache_key`] over the query text. An entry
//! is never served once it is older than the TTL: lookups check age
//! themselves, and a background sweep started with [`QueryCache::start`]
//! removes stale entries nobody asks for again. When a new key would push the
//! cache past capacity, the least recently accessed entry is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::hash::compute_cache_key;

/// Default time-to-live for cache entries (15 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Default maximum number of resident entries.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default interval between background sweeps (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Cache sizing and expiry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL, max_entries: DEFAULT_MAX_ENTRIES, sweep_interval: DEFAULT_SWEEP_INTERVAL }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
    /// Tie-breaker for entries touched within the same clock tick.
    access_seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> CacheState<V> {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn remove_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl));
        let removed = before - self.entries.len();
        self.expirations += removed as u64;
        removed
    }

    fn evict_lru(&mut self) -> Option<String> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_accessed, entry.access_seq))
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }
}

/// In-memory cache of upstream responses keyed by query text.
///
/// The cache has no knowledge of the network; the client decides what to
/// store. All state sits behind one async mutex so concurrent callers see
/// consistent capacity and expiry.
pub struct QueryCache<V> {
    state: Mutex<CacheState<V>>,
    config: CacheConfig,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl<V: Clone> QueryCache<V> {
    /// Create an empty cache. The background sweep is not running until [`QueryCache::start`].
    ///
    /// A `max_entries` of zero is raised to one.
    pub fn new(config: CacheConfig) -> Self {
        if config.max_entries == 0 {
            tracing::warn!("cache max_entries of 0 raised to 1");
        }
        let config = CacheConfig { max_entries: config.max_entries.max(1), ..config };
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_seq: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            config,
            sweeper: StdMutex::new(None),
        }
    }

    /// Get the configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached value for the exact query text.
    ///
    /// Expired entries are deleted on the spot and reported as absent.
    pub async fn get(&self, query: &str) -> Option<V> {
        let key = compute_cache_key(query);
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let expired = match state.entries.get(&key) {
            Some(entry) => entry.is_expired(now, self.config.ttl),
            None => {
                state.misses += 1;
                return None;
            }
        };

        if expired {
            state.entries.remove(&key);
            state.expirations += 1;
            state.misses += 1;
            return None;
        }

        let seq = state.bump_seq();
        state.hits += 1;
        let entry = state.entries.get_mut(&key)?;
        entry.last_accessed = now;
        entry.access_seq = seq;
        Some(entry.value.clone())
    }

    /// Store a value for the exact query text.
    ///
    /// An existing key is overwritten in place. A new key that would exceed
    /// `max_entries` first evicts the least recently accessed entry.
    pub async fn set(&self, query: &str, value: V) {
        let key = compute_cache_key(query);
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let seq = state.bump_seq();

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.value = value;
            entry.inserted_at = now;
            entry.last_accessed = now;
            entry.access_seq = seq;
            return;
        }

        while state.entries.len() >= self.config.max_entries {
            match state.evict_lru() {
                Some(evicted) => tracing::debug!(key = %evicted, "evicted least recently used cache entry"),
                None => break,
            }
        }

        state
            .entries
            .insert(key, CacheEntry { value, inserted_at: now, last_accessed: now, access_seq: seq });
    }

    /// Remove every entry. Returns the number removed.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    /// Remove every entry older than the TTL. Returns the number removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.remove_expired(now, self.config.ttl)
    }

    /// Number of resident entries, including any not yet swept.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the cache counters.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.config.max_entries,
            ttl_secs: self.config.ttl.as_secs(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }

    /// Stop the background sweep, if running.
    pub fn stop(&self) {
        let handle = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("cache sweeper stopped");
        }
    }

    /// Whether the background sweep task is alive.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the background sweep and drop every entry.
    pub async fn destroy(&self) {
        self.stop();
        let removed = self.clear().await;
        tracing::debug!(removed, "cache destroyed");
    }
}

impl<V: Clone + Send + 'static> QueryCache<V> {
    /// Start the periodic background sweep.
    ///
    /// Calling this while a sweep is already running does nothing. The task
    /// holds only a weak reference and exits once the cache is dropped.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let cache = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep().await;
                if removed > 0 {
                    tracing::info!(removed, "cache sweep removed expired entries");
                }
            }
        }));

        tracing::debug!(interval_secs = period.as_secs(), "cache sweeper started");
    }
}

impl<V> Drop for QueryCache<V> {
    fn drop(&mut self) {
        let handle = self.sweeper.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(max_entries: usize) -> QueryCache<String> {
        QueryCache::new(CacheConfig { max_entries, ..Default::default() })
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get() {
        let cache = cache_with(10);
        cache.set("node(1);out;", "one".to_string()).await;

        assert_eq!(cache.get("node(1);out;").await.as_deref(), Some("one"));
        assert_eq!(cache.get("node(2);out;").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_difference_is_a_different_key() {
        let cache = cache_with(10);
        cache.set("node(1);out;", "one".to_string()).await;
        assert_eq!(cache.get("node(1); out;").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_grow() {
        let cache = cache_with(2);
        cache.set("a", "first".to_string()).await;
        cache.set("a", "second".to_string()).await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("a").await.as_deref(), Some("second"));
        assert_eq!(cache.stats().await.evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recently_accessed() {
        let cache = cache_with(2);
        cache.set("a", "a".to_string()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("b", "b".to_string()).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        // "a" is older by insertion but was accessed more recently.
        assert!(cache.get("a").await.is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("c", "c".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_holds_without_clock_movement() {
        let cache = cache_with(3);
        for i in 0..20 {
            cache.set(&format!("q{i}"), i.to_string()).await;
            assert!(cache.len().await <= 3);
        }

        assert!(cache.get("q17").await.is_some());
        assert!(cache.get("q18").await.is_some());
        assert!(cache.get("q19").await.is_some());
        assert!(cache.get("q16").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_holds_one_entry() {
        let cache = cache_with(0);
        assert_eq!(cache.config().max_entries, 1);

        cache.set("a", "a".to_string()).await;
        cache.set("b", "b".to_string()).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get("b").await.is_some());
        assert_eq!(cache.stats().await.max_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_on_lookup() {
        let cache = cache_with(10);
        cache.set("q", "v".to_string()).await;

        tokio::time::advance(DEFAULT_TTL).await;
        assert!(cache.get("q").await.is_some(), "entry exactly at TTL is still served");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get("q").await.is_none());
        assert_eq!(cache.len().await, 0, "expired entry is deleted on lookup");
        assert_eq!(cache.stats().await.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_does_not_extend_ttl() {
        let cache = cache_with(10);
        cache.set("q", "v".to_string()).await;

        tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
        assert!(cache.get("q").await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("q").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_stale_entries() {
        let cache = cache_with(10);
        cache.set("old", "v".to_string()).await;
        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        cache.set("new", "v".to_string()).await;
        tokio::time::advance(Duration::from_secs(6 * 60)).await;

        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("new").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_runs_without_lookups() {
        let cache = Arc::new(cache_with(10));
        cache.set("never-read-again", "v".to_string()).await;
        cache.start();
        assert!(cache.is_sweeping());

        tokio::time::sleep(Duration::from_secs(21 * 60)).await;

        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stats().await.expirations, 1);
        cache.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_stop_cancels() {
        let cache = Arc::new(cache_with(10));
        cache.start();
        cache.start();
        assert!(cache.is_sweeping());

        cache.stop();
        assert!(!cache.is_sweeping());

        cache.set("q", "v".to_string()).await;
        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        assert_eq!(cache.len().await, 1, "no sweep after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_clears_and_stops() {
        let cache = Arc::new(cache_with(10));
        cache.start();
        cache.set("a", "v".to_string()).await;
        cache.set("b", "v".to_string()).await;

        cache.destroy().await;
        assert!(cache.is_empty().await);
        assert!(!cache.is_sweeping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_returns_removed_count() {
        let cache = cache_with(10);
        cache.set("a", "v".to_string()).await;
        cache.set("b", "v".to_string()).await;
        assert_eq!(cache.clear().await, 2);
        assert!(cache.get("a").await.is_none());
    }
}
