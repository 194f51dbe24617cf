//! usage_stats tool implementation.
//!
//! Reports upstream usage counters and the current endpoint preference.

use osmgeo_client::OverpassClient;
use osmgeo_core::UsageSnapshot;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Output structure for usage_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UsageStatsOutput {
    #[serde(flatten)]
    pub usage: UsageSnapshot,
    /// Endpoint the next query will try first.
    pub preferred_endpoint: String,
    /// All configured endpoints in pool order.
    pub endpoints: Vec<String>,
}

/// Implementation of the usage_stats tool.
pub fn usage_impl(client: &OverpassClient) -> Result<CallToolResult, McpError> {
    let pool = client.pool();
    let endpoints: Vec<String> = pool.endpoints().iter().map(|e| e.label().to_string()).collect();
    let preferred_endpoint = endpoints.get(pool.preferred()).cloned().unwrap_or_default();

    json_result(&UsageStatsOutput { usage: client.telemetry().snapshot(), preferred_endpoint, endpoints })
}
