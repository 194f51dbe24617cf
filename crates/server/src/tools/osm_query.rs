//! osm_query tool implementation.
//!
//! Runs raw Overpass QL through the resilient client and returns the result
//! as a GeoJSON FeatureCollection.

use geojson::FeatureCollection;
use osmgeo_client::{OverpassClient, QueryOptions, convert};
use osmgeo_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::json_result;

/// Input parameters for osm_query tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OsmQueryParams {
    /// Overpass QL query text. Must request `[out:json]`.
    pub query: String,

    /// Skip the response cache for this call.
    #[serde(default)]
    pub bypass_cache: bool,
}

/// Output structure for osm_query tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsmQueryOutput {
    /// Number of raw elements returned by the upstream.
    pub element_count: usize,
    /// Number of features with reconstructible geometry.
    pub feature_count: usize,
    /// Upstream runtime note, e.g. a server-side timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub features: FeatureCollection,
}

/// Implementation of the osm_query tool.
pub async fn query_impl(
    client: &OverpassClient, params: OsmQueryParams, cancel: &CancellationToken,
) -> Result<CallToolResult, McpError> {
    if params.query.trim().is_empty() {
        return Err(Error::InvalidInput("query cannot be empty".into()).into());
    }

    let options = QueryOptions::labeled("osm_query").bypass_cache(params.bypass_cache);
    let response = client
        .execute_with_cancel(&params.query, &options, cancel)
        .await
        .map_err(Error::from)?;

    let features = convert(&response.elements);
    let output = OsmQueryOutput {
        element_count: response.elements.len(),
        feature_count: features.features.len(),
        remark: response.remark.clone(),
        features,
    };

    json_result(&output)
}
