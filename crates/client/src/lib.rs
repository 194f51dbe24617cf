//! Client code for mcp-osm.
//!
//! This crate provides the resilient Overpass query client, query
//! construction, and GeoJSON conversion used by the server.

pub mod geometry;
pub mod overpass;

pub use geometry::convert;
pub use overpass::{
    BackoffPolicy, ElementKinds, Endpoint, EndpointPool, FeatureCategory, OverpassClient, OverpassResponse,
    QueryBuilder, QueryError, QueryOptions, TagFilter,
};
