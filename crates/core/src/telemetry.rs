//! Usage counters for the query client.
//!
//! Purely observational: recording never changes control flow, and every
//! method is cheap enough to call from the hot path.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide usage counters.
#[derive(Debug)]
pub struct UsageTelemetry {
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    upstream_successes: AtomicU64,
    rate_limited: AtomicU64,
    total_latency_ms: AtomicU64,
    endpoint_failures: Mutex<BTreeMap<String, u64>>,
}

/// Serializable view of [`UsageTelemetry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UsageSnapshot {
    /// RFC 3339 timestamp of when counting began.
    pub started_at: String,
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_successes: u64,
    pub upstream_failures: u64,
    pub rate_limited: u64,
    /// Mean latency of successful upstream calls, if any succeeded.
    pub average_latency_ms: Option<f64>,
    /// Failed attempts keyed by endpoint URL.
    pub endpoint_failures: BTreeMap<String, u64>,
}

impl Default for UsageTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageTelemetry {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            upstream_successes: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            endpoint_failures: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful upstream call and its latency.
    pub fn record_success(&self, latency: Duration) {
        self.upstream_successes.fetch_add(1, Ordering::Relaxed);
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.total_latency_ms.fetch_add(ms, Ordering::Relaxed);
    }

    /// Record one failed attempt against `endpoint`.
    pub fn record_failure(&self, endpoint: &str, rate_limited: bool) {
        if rate_limited {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
        let mut failures = self.endpoint_failures.lock().unwrap_or_else(PoisonError::into_inner);
        *failures.entry(endpoint.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let endpoint_failures = self
            .endpoint_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let successes = self.upstream_successes.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        UsageSnapshot {
            started_at: self.started_at.to_rfc3339(),
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            upstream_successes: successes,
            upstream_failures: endpoint_failures.values().sum(),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            average_latency_ms: (successes > 0).then(|| total_latency as f64 / successes as f64),
            endpoint_failures,
        }
    }
}
