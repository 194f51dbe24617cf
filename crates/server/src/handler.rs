//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{clear::clear_impl, stats::stats_impl},
    osm_features_in_bbox::{FeaturesInBboxParams, features_impl},
    osm_query::{OsmQueryParams, query_impl},
    usage_stats::usage_impl,
};

use osmgeo_client::OverpassClient;
use osmgeo_core::AppConfig;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for mcp-osm.
#[derive(Clone)]
pub struct McpOsmServer {
    client: OverpassClient,
    config: Arc<AppConfig>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl McpOsmServer {
    /// Create a new server handler around a shared client.
    pub fn new(client: OverpassClient, config: Arc<AppConfig>) -> Self {
        Self { client, config, tool_router: Self::tool_router() }
    }

    /// Run raw Overpass QL.
    ///
    /// Tries each configured endpoint in turn and converts the elements to GeoJSON.
    #[tool(
        description = "Run a raw Overpass QL query (must use [out:json]) against OpenStreetMap with automatic endpoint failover and caching. Returns a GeoJSON FeatureCollection."
    )]
    async fn osm_query(
        &self, params: Parameters<OsmQueryParams>, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        query_impl(&self.client, params.0, &context.ct).await
    }

    /// Find features inside a bounding box.
    #[tool(
        description = "Find OpenStreetMap features inside a bounding box (min_lon, min_lat, max_lon, max_lat), optionally filtered by category (amenities, buildings, highways, waterways, natural, landuse, leisure, shops, tourism, railways) and key/value tags. Returns GeoJSON plus validation warnings."
    )]
    async fn osm_features_in_bbox(
        &self, params: Parameters<FeaturesInBboxParams>, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        features_impl(&self.client, &self.config, params.0, &context.ct).await
    }

    /// Report query cache size and hit counters.
    #[tool(description = "Show query cache statistics: entries, capacity, TTL, hits, misses, evictions, expirations.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(self.client.cache()).await
    }

    /// Drop all cached responses.
    #[tool(description = "Remove every cached query response. Returns the number of entries removed.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(self.client.cache()).await
    }

    /// Report upstream usage counters.
    #[tool(
        description = "Show upstream usage: request and cache counters, successes, failures per endpoint, rate-limit events, average latency, and the preferred endpoint."
    )]
    async fn usage_stats(&self) -> Result<CallToolResult, McpError> {
        usage_impl(&self.client)
    }
}

impl ServerHandler for McpOsmServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-osm".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "OpenStreetMap queries via the Overpass API. Use osm_features_in_bbox for common lookups and osm_query for raw Overpass QL.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tools_registered() {
        let client = OverpassClient::from_config(&AppConfig::default()).unwrap();
        let server = McpOsmServer::new(client, Arc::new(AppConfig::default()));

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_clear", "cache_stats", "osm_features_in_bbox", "osm_query", "usage_stats"]);
    }

    #[test]
    fn test_server_info() {
        let client = OverpassClient::from_config(&AppConfig::default()).unwrap();
        let info = McpOsmServer::new(client, Arc::new(AppConfig::default())).get_info();
        assert_eq!(info.server_info.name, "mcp-osm");
        assert!(info.capabilities.tools.is_some());
    }
}
