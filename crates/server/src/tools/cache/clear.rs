//! cache_clear tool implementation.
//!
//! Drops every cached response. Counters are kept.

use osmgeo_client::overpass::ResponseCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Number of entries removed.
    pub cleared: usize,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(cache: &ResponseCache) -> Result<CallToolResult, McpError> {
    let cleared = cache.clear().await;
    tracing::info!(cleared, "query cache cleared");

    json_result(&CacheClearOutput { cleared })
}
