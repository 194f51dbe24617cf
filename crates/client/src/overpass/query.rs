//! Overpass QL construction for bounding-box feature lookups.
//!
//! Generated queries have the shape:
//!
//! ```text
//! [out:json][timeout:25][maxsize:536870912];
//! (
//!   node["amenity"="cafe"](52.5,13.4,52.6,13.5);
//!   way["amenity"="cafe"](52.5,13.4,52.6,13.5);
//! );
//! out body 100;
//! >;
//! out skel qt;
//! ```
//!
//! The spatial filter is `(south,west,north,east)`, latitude first. The
//! trailing `>; out skel qt;` pulls in the vertices of matched ways and
//! relations so their geometry can be rebuilt.

use osmgeo_core::BoundingBox;
use serde::{Deserialize, Serialize};

/// Default `[timeout:]` directive in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 25;

/// A single tag predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TagFilter {
    pub key: String,
    /// Exact value to match. `None` matches any element carrying the key.
    #[serde(default)]
    pub value: Option<String>,
}

impl TagFilter {
    pub fn exists(key: &str) -> Self {
        Self { key: key.to_string(), value: None }
    }

    pub fn equals(key: &str, value: &str) -> Self {
        Self { key: key.to_string(), value: Some(value.to_string()) }
    }

    fn to_ql(&self) -> String {
        match &self.value {
            Some(value) => format!("[\"{}\"=\"{}\"]", escape(&self.key), escape(value)),
            None => format!("[\"{}\"]", escape(&self.key)),
        }
    }
}

/// Escape a string for use inside a double-quoted QL literal.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Common map feature families, each selected by one tag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Amenities,
    Buildings,
    Highways,
    Waterways,
    Natural,
    Landuse,
    Leisure,
    Shops,
    Tourism,
    Railways,
}

impl FeatureCategory {
    /// The tag key that defines this category.
    pub fn key(self) -> &'static str {
        match self {
            FeatureCategory::Amenities => "amenity",
            FeatureCategory::Buildings => "building",
            FeatureCategory::Highways => "highway",
            FeatureCategory::Waterways => "waterway",
            FeatureCategory::Natural => "natural",
            FeatureCategory::Landuse => "landuse",
            FeatureCategory::Leisure => "leisure",
            FeatureCategory::Shops => "shop",
            FeatureCategory::Tourism => "tourism",
            FeatureCategory::Railways => "railway",
        }
    }

    pub fn filter(self) -> TagFilter {
        TagFilter::exists(self.key())
    }
}

/// Which element kinds a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ElementKinds {
    pub nodes: bool,
    pub ways: bool,
    pub relations: bool,
}

impl Default for ElementKinds {
    fn default() -> Self {
        Self { nodes: true, ways: true, relations: true }
    }
}

impl ElementKinds {
    fn selected(&self) -> impl Iterator<Item = &'static str> {
        [(self.nodes, "node"), (self.ways, "way"), (self.relations, "relation")]
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
    }

    pub fn is_empty(&self) -> bool {
        !(self.nodes || self.ways || self.relations)
    }
}

/// Builder for bounding-box queries.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    bbox: BoundingBox,
    filters: Vec<TagFilter>,
    kinds: ElementKinds,
    timeout_secs: u32,
    max_memory_bytes: Option<u64>,
    limit: Option<u32>,
}

impl QueryBuilder {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            filters: Vec::new(),
            kinds: ElementKinds::default(),
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            max_memory_bytes: None,
            limit: None,
        }
    }

    /// Add a tag predicate. All predicates must match.
    pub fn filter(mut self, filter: TagFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn kinds(mut self, kinds: ElementKinds) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn max_memory_bytes(mut self, bytes: Option<u64>) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Render the query text.
    pub fn build(&self) -> String {
        let mut query = format!("[out:json][timeout:{}]", self.timeout_secs);
        if let Some(bytes) = self.max_memory_bytes {
            query.push_str(&format!("[maxsize:{bytes}]"));
        }
        query.push_str(";\n(\n");

        let filters: String = self.filters.iter().map(TagFilter::to_ql).collect();
        let spatial = self.bbox.to_overpass_filter();
        for kind in self.kinds.selected() {
            query.push_str(&format!("  {kind}{filters}{spatial};\n"));
        }

        query.push_str(");\n");
        match self.limit {
            Some(limit) => query.push_str(&format!("out body {limit};\n")),
            None => query.push_str("out body;\n"),
        }
        query.push_str(">;\nout skel qt;");
        query
    }
}
