//! cache_stats tool implementation.

use osmgeo_client::overpass::ResponseCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use crate::tools::json_result;

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &ResponseCache) -> Result<CallToolResult, McpError> {
    json_result(&cache.stats().await)
}
