//! Unified error types for mcp-osm.

use rmcp::model::{ErrorCode, ErrorData as McpError};

use crate::bbox::ValidationError;
use crate::config::ConfigError;

/// Unified error types for the mcp-osm server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Bounding box or limit outside the allowed domain.
    #[error("VALIDATION_FAILED: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Every configured endpoint failed for one query.
    #[error("UPSTREAM_EXHAUSTED: {0}")]
    UpstreamExhausted(String),

    /// The query was cancelled before it completed.
    #[error("CANCELLED")]
    Cancelled,

    /// Configuration could not be loaded or is invalid.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::ValidationFailed(e) => (-32602, e.to_string()),
            Error::UpstreamExhausted(msg) => (-32020, msg.clone()),
            Error::Cancelled => (-32021, "Query was cancelled".to_string()),
            Error::Config(e) => (-32022, e.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
