//! Overpass client error types.

use std::sync::Arc;

use osmgeo_core::{ConfigError, Error};

use super::endpoint::EndpointError;

/// How the client should proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Rate limited: wait an exponentially growing delay.
    Backoff,
    /// Transient server error: wait a short fixed delay.
    FixedDelay,
    /// Anything else: move on to the next endpoint right away.
    Immediate,
}

/// Failure of one attempt against one endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttemptError {
    /// The attempt exceeded its timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection refused, DNS failure, TLS failure, or a broken body stream.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Network failure from a non-reqwest transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered 429.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Upstream answered 5xx.
    #[error("upstream server error: HTTP {status}")]
    Server { status: u16 },

    /// Any other non-200 status.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// 200 with a body that is not an Overpass JSON payload.
    #[error("parse error: {0}")]
    Parse(String),
}

impl AttemptError {
    /// Map an HTTP status other than 200 onto the error taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => AttemptError::RateLimited,
            500..=599 => AttemptError::Server { status },
            _ => AttemptError::Http { status },
        }
    }

    /// Retry disposition for this failure.
    pub fn classify(&self) -> Disposition {
        match self {
            AttemptError::RateLimited => Disposition::Backoff,
            AttemptError::Server { .. } => Disposition::FixedDelay,
            AttemptError::Timeout
            | AttemptError::Network(_)
            | AttemptError::Transport(_)
            | AttemptError::Http { .. }
            | AttemptError::Parse(_) => Disposition::Immediate,
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { AttemptError::Timeout } else { AttemptError::Network(Arc::new(err)) }
    }
}

/// Errors returned by [`crate::OverpassClient::execute`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// Every endpoint failed; carries the last endpoint's failure only.
    #[error("all endpoints failed; last endpoint {endpoint}: {source}")]
    Exhausted {
        endpoint: String,
        #[source]
        source: AttemptError,
    },

    /// The caller cancelled the query.
    #[error("query cancelled")]
    Cancelled,
}

/// Errors constructing a client from configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<BuildError> for Error {
    fn from(err: BuildError) -> Self {
        let field = match &err {
            BuildError::Endpoint(_) => "endpoints",
            BuildError::Http(_) => "user_agent",
        };
        Error::Config(ConfigError::Invalid { field: field.into(), reason: err.to_string() })
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Exhausted { .. } => Error::UpstreamExhausted(err.to_string()),
            QueryError::Cancelled => Error::Cancelled,
        }
    }
}
