//! Overpass API response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form OSM tags.
pub type Tags = BTreeMap<String, String>;

/// Parsed `[out:json]` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub version: Option<f64>,
    #[serde(default)]
    pub generator: Option<String>,
    /// Runtime notes from the upstream, e.g. a server-side timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub elements: Vec<Element>,
}

/// One element in the flat, ordered element list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
    /// Element kinds that carry no geometry (`area`, `count`, ...).
    #[serde(other)]
    Other,
}

impl Element {
    /// Element type name as used in feature ids. `None` for kinds without geometry.
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Element::Node(_) => Some("node"),
            Element::Way(_) => Some("way"),
            Element::Relation(_) => Some("relation"),
            Element::Other => None,
        }
    }
}

/// A point. Coordinates may be absent, e.g. under `out ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub tags: Tags,
}

impl Node {
    /// `(lon, lat)` if both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lon?, self.lat?))
    }
}

/// An ordered chain of node references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: Tags,
}

/// A role-tagged group of other elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub member_type: MemberType,
    #[serde(rename = "ref")]
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Node,
    Way,
    Relation,
}
