//! In-memory cache for upstream query responses.
//!
//! This module provides a content-addressed, process-local cache. It supports:
//!
//! - Content-addressed keys using SHA-256 over the exact query text
//! - Lazy expiry on lookup plus a periodic background sweep
//! - LRU eviction when the configured capacity is reached

pub mod hash;
pub mod query_cache;

pub use hash::compute_cache_key;
pub use query_cache::{CacheConfig, CacheStats, QueryCache};
