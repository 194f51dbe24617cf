//! HTTP transport for single query attempts.
//!
//! ### Wire contract
//! - `POST` to the endpoint URL with the raw query text as a UTF-8 body.
//! - `Content-Type: text/plain`, a fixed `User-Agent`, and `Host` set to the
//!   endpoint's DNS name. `Content-Length` is derived from the body by reqwest.
//! - Certificate validation is disabled. Endpoints are addressed by IP
//!   literal, so the presented certificate never matches the connect address.
//!   This trades server authentication for reachability of pinned instances.
//! - A fixed per-attempt timeout covers connect, send, and body read.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, header};

use super::endpoint::Endpoint;
use super::error::AttemptError;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = "mcp-osm/0.1";

/// Raw outcome of one attempt that reached the upstream.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Sends one query to one endpoint.
///
/// Implementations report only transport-level failures; status handling and
/// body parsing belong to the caller.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, endpoint: &Endpoint, query: &str) -> Result<TransportResponse, AttemptError>;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// User agent string (default: "mcp-osm/0.1")
    pub user_agent: String,

    /// Per-attempt timeout (default: 60s)
    pub timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self { user_agent: DEFAULT_USER_AGENT.to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .danger_accept_invalid_certs(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &Endpoint, query: &str) -> Result<TransportResponse, AttemptError> {
        let response = self
            .http
            .post(endpoint.url.clone())
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::HOST, endpoint.host.as_str())
            .body(query.to_owned())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        tracing::debug!(endpoint = %endpoint.label(), status, bytes = body.len(), "upstream responded");

        Ok(TransportResponse { status, body })
    }
}
