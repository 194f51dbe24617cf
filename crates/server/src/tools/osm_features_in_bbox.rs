//! osm_features_in_bbox tool implementation.
//!
//! Validates a bounding box, builds a feature query from a category and/or
//! tag filters, and returns the matching features as GeoJSON together with
//! any validation warnings.

use geojson::FeatureCollection;
use osmgeo_client::{ElementKinds, FeatureCategory, OverpassClient, QueryBuilder, QueryOptions, TagFilter, convert};
use osmgeo_core::{AppConfig, BoundingBox, Error, ValidationWarning, validate_bbox};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::json_result;

/// Input parameters for osm_features_in_bbox tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FeaturesInBboxParams {
    /// Western edge, degrees longitude (-180..180).
    pub min_lon: f64,
    /// Southern edge, degrees latitude (-90..90).
    pub min_lat: f64,
    /// Eastern edge, degrees longitude.
    pub max_lon: f64,
    /// Northern edge, degrees latitude.
    pub max_lat: f64,

    /// Feature family to select, e.g. "amenities" or "buildings".
    #[serde(default)]
    pub category: Option<FeatureCategory>,

    /// Extra tag filters; all must match.
    #[serde(default)]
    pub tags: Vec<TagFilter>,

    /// Element kinds to select (default: all).
    #[serde(default)]
    pub kinds: Option<ElementKinds>,

    /// Maximum number of elements (1-10000).
    #[serde(default)]
    pub limit: Option<i64>,

    /// Skip the response cache for this call.
    #[serde(default)]
    pub bypass_cache: bool,
}

/// Output structure for osm_features_in_bbox tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesInBboxOutput {
    pub bbox: BoundingBox,
    /// Non-fatal validation findings.
    pub warnings: Vec<ValidationWarning>,
    /// The generated Overpass QL.
    pub query: String,
    pub element_count: usize,
    pub feature_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub features: FeatureCollection,
}

/// Implementation of the osm_features_in_bbox tool.
pub async fn features_impl(
    client: &OverpassClient, config: &AppConfig, params: FeaturesInBboxParams, cancel: &CancellationToken,
) -> Result<CallToolResult, McpError> {
    let validated = validate_bbox(
        params.min_lon,
        params.min_lat,
        params.max_lon,
        params.max_lat,
        params.limit,
        config.area_warning_threshold,
    )
    .map_err(Error::from)?;

    let kinds = params.kinds.unwrap_or_default();
    if kinds.is_empty() {
        return Err(Error::InvalidInput("at least one element kind must be selected".into()).into());
    }

    if let Some(filter) = params.tags.iter().find(|f| f.key.is_empty()) {
        return Err(Error::InvalidInput(format!("tag filter key cannot be empty (value: {:?})", filter.value)).into());
    }

    let mut builder = QueryBuilder::new(validated.bbox)
        .kinds(kinds)
        .timeout_secs(config.query_timeout_secs)
        .max_memory_bytes(config.query_max_memory_bytes)
        .limit(validated.limit);
    if let Some(category) = params.category {
        builder = builder.filter(category.filter());
    }
    for filter in params.tags {
        builder = builder.filter(filter);
    }
    let query = builder.build();

    let options = QueryOptions::labeled("osm_features_in_bbox").bypass_cache(params.bypass_cache);
    let response = client
        .execute_with_cancel(&query, &options, cancel)
        .await
        .map_err(Error::from)?;

    let features = convert(&response.elements);
    let output = FeaturesInBboxOutput {
        bbox: validated.bbox,
        warnings: validated.warnings,
        query,
        element_count: response.elements.len(),
        feature_count: features.features.len(),
        remark: response.remark.clone(),
        features,
    };

    json_result(&output)
}
