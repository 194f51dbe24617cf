//! Upstream endpoints and the rotating preference policy.
//!
//! The pool is pure selection policy with no I/O. Attempt order always starts
//! at the preferred endpoint and wraps around; the preference moves only when
//! a different endpoint completes a request. There is no health tracking, so
//! an endpoint in a sustained outage stays first until another one succeeds.

use std::sync::atomic::{AtomicUsize, Ordering};

use osmgeo_core::EndpointConfig;
use url::Url;

/// Errors building endpoints from configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EndpointError {
    #[error("no endpoints configured")]
    Empty,

    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// One upstream instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport address, often an IP literal, including the interpreter path.
    pub url: Url,
    /// DNS name the upstream expects in the `Host` header.
    pub host: String,
}

impl Endpoint {
    pub fn new(url: &str, host: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(url).map_err(|e| EndpointError::InvalidUrl { url: url.into(), reason: e.to_string() })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(EndpointError::InvalidUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme: {scheme}"),
                });
            }
        }

        Ok(Self { url, host: host.to_string() })
    }

    /// Label used in logs, telemetry, and error messages.
    pub fn label(&self) -> &str {
        self.url.as_str()
    }
}

impl TryFrom<&EndpointConfig> for Endpoint {
    type Error = EndpointError;

    fn try_from(config: &EndpointConfig) -> Result<Self, Self::Error> {
        Endpoint::new(&config.url, &config.host)
    }
}

/// Ordered endpoints plus the index of the currently preferred one.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
    preferred: AtomicUsize,
}

impl EndpointPool {
    /// Create a pool preferring the first endpoint.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, EndpointError> {
        if endpoints.is_empty() {
            return Err(EndpointError::Empty);
        }
        Ok(Self { endpoints, preferred: AtomicUsize::new(0) })
    }

    /// Build a pool from configuration entries.
    pub fn from_config(configs: &[EndpointConfig]) -> Result<Self, EndpointError> {
        let endpoints = configs.iter().map(Endpoint::try_from).collect::<Result<Vec<_>, _>>()?;
        Self::new(endpoints)
    }

    /// Every endpoint exactly once, starting at the preferred one and wrapping around.
    pub fn attempt_order(&self) -> Vec<(usize, &Endpoint)> {
        let len = self.endpoints.len();
        let start = self.preferred();
        (0..len)
            .map(|offset| {
                let index = (start + offset) % len;
                (index, &self.endpoints[index])
            })
            .collect()
    }

    /// Make the endpoint at `index` preferred. Out-of-range indexes are ignored.
    pub fn record_success(&self, index: usize) {
        if index >= self.endpoints.len() {
            tracing::warn!(index, len = self.endpoints.len(), "ignoring success for unknown endpoint index");
            return;
        }
        let previous = self.preferred.swap(index, Ordering::AcqRel);
        if previous != index {
            tracing::info!(endpoint = %self.endpoints[index].label(), "preferred endpoint changed");
        }
    }

    pub fn preferred(&self) -> usize {
        self.preferred.load(Ordering::Acquire)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
