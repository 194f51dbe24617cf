//! Resilient Overpass API client.
//!
//! Executes raw Overpass QL against a pool of interchangeable endpoints,
//! with an in-memory response cache in front.
//!
//! ### Behavior
//!
//! - **Cache**: unless bypassed, a cached response for the exact query text is
//!   returned without network access. Successful responses are stored.
//! - **Failover**: endpoints are tried once each, starting at the preferred
//!   one. The first success becomes the new preference.
//! - **Backoff** between endpoints, chosen by the failure:
//!   - 429: `base * 2^attempt`, capped at `max`.
//!   - 5xx: a short fixed delay.
//!   - anything else: no delay.
//!
//!   No delay follows the last endpoint.
//! - **Cancellation**: honored at every network attempt and every backoff
//!   sleep. Pool and cache are only updated after a response is fully read and
//!   parsed, so a cancelled call leaves both untouched.
//! - Concurrent identical queries are not coalesced; each may go upstream.

pub mod endpoint;
pub mod error;
pub mod query;
pub mod response;
pub mod transport;

pub use endpoint::{Endpoint, EndpointError, EndpointPool};
pub use error::{AttemptError, BuildError, Disposition, QueryError};
pub use query::{ElementKinds, FeatureCategory, QueryBuilder, TagFilter};
pub use response::{Element, Member, MemberType, Node, OverpassResponse, Relation, Tags, Way};
pub use transport::{HttpTransport, HttpTransportConfig, Transport, TransportResponse};

use std::sync::Arc;
use std::time::Duration;

use osmgeo_core::{AppConfig, QueryCache, UsageTelemetry};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cache of parsed responses keyed by query text.
pub type ResponseCache = QueryCache<Arc<OverpassResponse>>;

/// Delays applied between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First rate-limit delay (default: 1s)
    pub base: Duration,

    /// Rate-limit delay ceiling (default: 16s)
    pub max: Duration,

    /// Delay after a 5xx (default: 500ms)
    pub server_error_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base: Duration::from_secs(1), max: Duration::from_secs(16), server_error_delay: Duration::from_millis(500) }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
            server_error_delay: Duration::from_millis(config.server_error_delay_ms),
        }
    }

    /// Delay before the next endpoint after attempt number `attempt` (zero-based) failed.
    pub fn delay_for(&self, disposition: Disposition, attempt: usize) -> Duration {
        match disposition {
            Disposition::Backoff => {
                let factor = u32::try_from(attempt).ok().and_then(|n| 1u32.checked_shl(n)).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor).min(self.max)
            }
            Disposition::FixedDelay => self.server_error_delay,
            Disposition::Immediate => Duration::ZERO,
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Skip the cache for both lookup and store.
    pub bypass_cache: bool,

    /// Caller label attached to log events.
    pub label: String,
}

impl QueryOptions {
    pub fn labeled(label: &str) -> Self {
        Self { bypass_cache: false, label: label.to_string() }
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }
}

/// Overpass client with failover, backoff and caching.
#[derive(Clone)]
pub struct OverpassClient {
    pool: Arc<EndpointPool>,
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache>,
    telemetry: Arc<UsageTelemetry>,
    backoff: BackoffPolicy,
}

impl std::fmt::Debug for OverpassClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverpassClient")
            .field("pool", &self.pool)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl OverpassClient {
    pub fn new(
        pool: EndpointPool, transport: Arc<dyn Transport>, cache: Arc<ResponseCache>, telemetry: Arc<UsageTelemetry>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self { pool: Arc::new(pool), transport, cache, telemetry, backoff }
    }

    /// Build a client with the HTTP transport from application configuration.
    ///
    /// The cache sweep is not started; call [`QueryCache::start`] on [`Self::cache`].
    ///
    /// # Errors
    ///
    /// Returns `BuildError` if an endpoint is malformed or the HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        let pool = EndpointPool::from_config(&config.endpoints)?;
        let transport =
            HttpTransport::new(HttpTransportConfig { user_agent: config.user_agent.clone(), timeout: config.timeout() })?;
        let cache = Arc::new(QueryCache::new(config.cache_config()));

        Ok(Self::new(pool, Arc::new(transport), cache, Arc::new(UsageTelemetry::new()), BackoffPolicy::from_config(config)))
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn telemetry(&self) -> &Arc<UsageTelemetry> {
        &self.telemetry
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Execute a query without external cancellation.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Exhausted` if every endpoint fails.
    pub async fn execute(&self, query: &str, options: &QueryOptions) -> Result<Arc<OverpassResponse>, QueryError> {
        self.execute_with_cancel(query, options, &CancellationToken::new()).await
    }

    /// Execute a query, stopping early once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Cancelled` if the token fires first, or
    /// `QueryError::Exhausted` carrying the last endpoint's failure.
    pub async fn execute_with_cancel(
        &self, query: &str, options: &QueryOptions, cancel: &CancellationToken,
    ) -> Result<Arc<OverpassResponse>, QueryError> {
        self.telemetry.record_request();

        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        if !options.bypass_cache {
            if let Some(cached) = self.cache.get(query).await {
                self.telemetry.record_cache_hit();
                tracing::debug!(label = %options.label, "query served from cache");
                return Ok(cached);
            }
            self.telemetry.record_cache_miss();
        }

        let order = self.pool.attempt_order();
        let last_attempt = order.len().saturating_sub(1);

        for (attempt, (index, endpoint)) in order.into_iter().enumerate() {
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(label = %options.label, endpoint = %endpoint.label(), "query cancelled in flight");
                    return Err(QueryError::Cancelled);
                }
                outcome = self.attempt(endpoint, query) => outcome,
            };

            match outcome {
                Ok(response) => {
                    if let Some(remark) = &response.remark {
                        tracing::warn!(label = %options.label, endpoint = %endpoint.label(), remark = %remark, "upstream returned a remark");
                    }

                    let response = Arc::new(response);
                    if !options.bypass_cache {
                        self.cache.set(query, Arc::clone(&response)).await;
                    }
                    self.pool.record_success(index);

                    let latency = started.elapsed();
                    self.telemetry.record_success(latency);
                    tracing::info!(
                        label = %options.label,
                        endpoint = %endpoint.label(),
                        elements = response.elements.len(),
                        latency_ms = latency.as_millis() as u64,
                        "query completed"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    let disposition = err.classify();
                    self.telemetry.record_failure(endpoint.label(), matches!(err, AttemptError::RateLimited));
                    tracing::warn!(
                        label = %options.label,
                        endpoint = %endpoint.label(),
                        attempt,
                        error = %err,
                        "endpoint attempt failed"
                    );

                    if attempt == last_attempt {
                        return Err(QueryError::Exhausted { endpoint: endpoint.label().to_string(), source: err });
                    }

                    let delay = self.backoff.delay_for(disposition, attempt);
                    if !delay.is_zero() {
                        tracing::debug!(delay_ms = delay.as_millis() as u64, "waiting before next endpoint");
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(QueryError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        Err(QueryError::Exhausted {
            endpoint: String::new(),
            source: AttemptError::Transport("endpoint pool is empty".to_string()),
        })
    }

    /// One attempt: status check and body parse.
    async fn attempt(&self, endpoint: &Endpoint, query: &str) -> Result<OverpassResponse, AttemptError> {
        let response = self.transport.post(endpoint, query).await?;

        if response.status != 200 {
            return Err(AttemptError::from_status(response.status));
        }

        serde_json::from_slice(&response.body).map_err(|e| AttemptError::Parse(e.to_string()))
    }
}
