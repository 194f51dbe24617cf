//! Conversion of Overpass element lists into GeoJSON.
//!
//! Pure and deterministic: output features follow input element order and
//! unresolvable geometry degrades to a dropped feature or ring, never an
//! error.
//!
//! ### Rules
//!
//! - Untagged nodes and ways are vertices and relation members. They feed
//!   coordinate and member lookup but produce no feature of their own.
//! - **Node** with coordinates: `Point`.
//! - **Way**: node ids resolved through every node in the list; unknown ids
//!   are skipped. Closed (first id == last id) with at least 4 resolved
//!   positions: `Polygon`. Otherwise `LineString`. Nothing resolved: no feature.
//! - **Relation** `type=multipolygon`: member ways with role `outer`/`inner`
//!   become rings when they resolve at least 4 positions. One outer ring gives
//!   a `Polygon` with the inner rings as holes. Several outer rings give a
//!   `MultiPolygon` of bare outer rings; inner rings are not assigned.
//! - **Relation** with a `boundary` tag: member way positions are concatenated
//!   in member order, without stitching, into a `LineString` of at least 2
//!   positions.
//! - Anything else: no feature.
//!
//! Feature ids are `"{type}/{id}"` and properties are the element tags.

use std::collections::HashMap;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};

use crate::overpass::{Element, MemberType, Relation, Tags, Way};

/// A `[lon, lat]` position.
type Position = Vec<f64>;

/// Minimum positions for a closed ring.
const MIN_RING_POSITIONS: usize = 4;

/// Minimum positions for a boundary line.
const MIN_LINE_POSITIONS: usize = 2;

/// Lookup tables built in a first pass over the whole element list.
struct Index<'a> {
    nodes: HashMap<i64, (f64, f64)>,
    ways: HashMap<i64, &'a Way>,
}

impl<'a> Index<'a> {
    fn build(elements: &'a [Element]) -> Self {
        let mut nodes = HashMap::new();
        let mut ways = HashMap::new();

        for element in elements {
            match element {
                Element::Node(node) => {
                    if let Some(coordinates) = node.coordinates() {
                        nodes.insert(node.id, coordinates);
                    }
                }
                Element::Way(way) => {
                    ways.insert(way.id, way);
                }
                _ => {}
            }
        }

        Self { nodes, ways }
    }

    /// Resolve node ids to positions, skipping unknown ids.
    fn resolve(&self, node_ids: &[i64]) -> Vec<Position> {
        node_ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|&(lon, lat)| vec![lon, lat])
            .collect()
    }

    /// Positions of each member way of `relation` with the given role (any role if `None`).
    fn member_ways(&self, relation: &Relation, role: Option<&str>) -> Vec<Vec<Position>> {
        relation
            .members
            .iter()
            .filter(|member| member.member_type == MemberType::Way)
            .filter(|member| role.is_none_or(|role| member.role == role))
            .filter_map(|member| self.ways.get(&member.id))
            .map(|way| self.resolve(&way.nodes))
            .collect()
    }
}

/// Convert an element list into a feature collection.
pub fn convert(elements: &[Element]) -> FeatureCollection {
    let index = Index::build(elements);

    let features = elements
        .iter()
        .filter_map(|element| {
            let (value, id, tags) = match element {
                Element::Node(node) => {
                    if node.tags.is_empty() {
                        return None;
                    }
                    let (lon, lat) = node.coordinates()?;
                    (Value::Point(vec![lon, lat]), node.id, &node.tags)
                }
                Element::Way(way) => {
                    if way.tags.is_empty() {
                        return None;
                    }
                    (way_geometry(&index, way)?, way.id, &way.tags)
                }
                Element::Relation(relation) => (relation_geometry(&index, relation)?, relation.id, &relation.tags),
                Element::Other => return None,
            };
            Some(feature(element.kind()?, id, value, tags))
        })
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}

fn way_geometry(index: &Index<'_>, way: &Way) -> Option<Value> {
    let positions = index.resolve(&way.nodes);
    if positions.is_empty() {
        return None;
    }

    let closed = way.nodes.len() > 1 && way.nodes.first() == way.nodes.last();
    if closed && positions.len() >= MIN_RING_POSITIONS {
        Some(Value::Polygon(vec![positions]))
    } else {
        Some(Value::LineString(positions))
    }
}

fn relation_geometry(index: &Index<'_>, relation: &Relation) -> Option<Value> {
    if relation.tags.get("type").map(String::as_str) == Some("multipolygon") {
        return multipolygon_geometry(index, relation);
    }

    if relation.tags.contains_key("boundary") {
        let line: Vec<Position> = index.member_ways(relation, None).into_iter().flatten().collect();
        return (line.len() >= MIN_LINE_POSITIONS).then_some(Value::LineString(line));
    }

    None
}

fn multipolygon_geometry(index: &Index<'_>, relation: &Relation) -> Option<Value> {
    let rings = |role| -> Vec<Vec<Position>> {
        index
            .member_ways(relation, Some(role))
            .into_iter()
            .filter(|ring| ring.len() >= MIN_RING_POSITIONS)
            .collect()
    };

    let mut outers = rings("outer");
    let inners = rings("inner");

    match outers.len() {
        0 => None,
        1 => {
            let mut polygon = Vec::with_capacity(1 + inners.len());
            polygon.append(&mut outers);
            polygon.extend(inners);
            Some(Value::Polygon(polygon))
        }
        _ => Some(Value::MultiPolygon(outers.into_iter().map(|outer| vec![outer]).collect())),
    }
}

fn feature(kind: &str, id: i64, value: Value, tags: &Tags) -> Feature {
    let properties: JsonObject =
        tags.iter().map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone()))).collect();

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::String(format!("{kind}/{id}"))),
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overpass::OverpassResponse;

    fn elements(json: &str) -> Vec<Element> {
        let response: OverpassResponse = serde_json::from_str(&format!(r#"{{"elements": {json}}}"#)).unwrap();
        response.elements
    }

    fn geometry(feature: &Feature) -> &Value {
        &feature.geometry.as_ref().unwrap().value
    }

    fn id(feature: &Feature) -> &str {
        match feature.id.as_ref().unwrap() {
            Id::String(id) => id,
            Id::Number(_) => panic!("expected string id"),
        }
    }

    const SQUARE_NODES: &str = r#"
        {"type": "node", "id": 1, "lon": 0, "lat": 0},
        {"type": "node", "id": 2, "lon": 1, "lat": 0},
        {"type": "node", "id": 3, "lon": 1, "lat": 1},
        {"type": "node", "id": 4, "lon": 0, "lat": 1}
    "#;

    #[test]
    fn test_closed_building_way_becomes_polygon() {
        let input = elements(&format!(
            r#"[{SQUARE_NODES}, {{"type": "way", "id": 10, "nodes": [1, 2, 3, 4, 1], "tags": {{"building": "yes"}}}}]"#
        ));
        let collection = convert(&input);
        assert_eq!(collection.features.len(), 1);

        let way = &collection.features[0];
        assert_eq!(id(way), "way/10");
        assert_eq!(way.properties.as_ref().unwrap().get("building"), Some(&serde_json::json!("yes")));
        assert_eq!(
            geometry(way),
            &Value::Polygon(vec![vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0], vec![0.0, 0.0]]])
        );
    }

    #[test]
    fn test_only_tagged_nodes_become_points() {
        let input = elements(&format!(
            r#"[{SQUARE_NODES}, {{"type": "node", "id": 5, "lon": 2, "lat": 3, "tags": {{"amenity": "cafe"}}}}]"#
        ));
        let collection = convert(&input);
        assert_eq!(collection.features.len(), 1);
        assert_eq!(id(&collection.features[0]), "node/5");
        assert_eq!(geometry(&collection.features[0]), &Value::Point(vec![2.0, 3.0]));
        assert_eq!(collection.features[0].properties.as_ref().unwrap().get("amenity"), Some(&serde_json::json!("cafe")));
    }

    #[test]
    fn test_untagged_vertices_still_resolve_ways() {
        let input = elements(&format!(
            r#"[{SQUARE_NODES}, {{"type": "way", "id": 11, "nodes": [1, 2], "tags": {{"highway": "path"}}}}]"#
        ));
        let collection = convert(&input);
        assert_eq!(collection.features.len(), 1);
        assert_eq!(geometry(&collection.features[0]), &Value::LineString(vec![vec![0.0, 0.0], vec![1.0, 0.0]]));
    }

    #[test]
    fn test_open_way_is_line_string() {
        let input = elements(&format!(r#"[{SQUARE_NODES}, {{"type": "way", "id": 11, "nodes": [1, 2, 3, 4], "tags": {{"highway": "service"}}}}]"#));
        let collection = convert(&input);
        let way = collection.features.last().unwrap();
        assert_eq!(id(way), "way/11");
        assert!(matches!(geometry(way), Value::LineString(line) if line.len() == 4));
    }

    #[test]
    fn test_short_closed_way_is_line_string() {
        let input = elements(&format!(r#"[{SQUARE_NODES}, {{"type": "way", "id": 12, "nodes": [1, 2, 1], "tags": {{"barrier": "fence"}}}}]"#));
        let collection = convert(&input);
        assert!(matches!(geometry(collection.features.last().unwrap()), Value::LineString(_)));
    }

    #[test]
    fn test_nodes_after_way_are_resolved() {
        let input = elements(&format!(r#"[{{"type": "way", "id": 10, "nodes": [1, 2, 3, 4, 1], "tags": {{"building": "yes"}}}}, {SQUARE_NODES}]"#));
        let collection = convert(&input);
        assert_eq!(id(&collection.features[0]), "way/10");
        assert!(matches!(geometry(&collection.features[0]), Value::Polygon(_)));
    }

    #[test]
    fn test_unresolved_nodes_are_dropped() {
        let input = elements(&format!(r#"[{SQUARE_NODES}, {{"type": "way", "id": 13, "nodes": [1, 99, 2], "tags": {{"highway": "footway"}}}}]"#));
        let collection = convert(&input);
        assert_eq!(
            geometry(collection.features.last().unwrap()),
            &Value::LineString(vec![vec![0.0, 0.0], vec![1.0, 0.0]])
        );
    }

    #[test]
    fn test_way_with_no_resolved_nodes_is_skipped() {
        let input = elements(r#"[{"type": "way", "id": 14, "nodes": [7, 8, 9], "tags": {"highway": "track"}}]"#);
        assert!(convert(&input).features.is_empty());
    }

    #[test]
    fn test_node_without_coordinates_is_skipped() {
        let input = elements(r#"[{"type": "node", "id": 5, "tags": {"amenity": "cafe"}}]"#);
        assert!(convert(&input).features.is_empty());
    }

    const HOLE_NODES: &str = r#"
        {"type": "node", "id": 1, "lon": 0, "lat": 0},
        {"type": "node", "id": 2, "lon": 4, "lat": 0},
        {"type": "node", "id": 3, "lon": 4, "lat": 4},
        {"type": "node", "id": 4, "lon": 0, "lat": 4},
        {"type": "node", "id": 5, "lon": 1, "lat": 1},
        {"type": "node", "id": 6, "lon": 2, "lat": 1},
        {"type": "node", "id": 7, "lon": 1, "lat": 2}
    "#;

    #[test]
    fn test_multipolygon_with_hole() {
        let input = elements(&format!(
            r#"[{HOLE_NODES},
                {{"type": "way", "id": 20, "nodes": [1, 2, 3, 4, 1]}},
                {{"type": "way", "id": 21, "nodes": [5, 6, 7, 5]}},
                {{"type": "relation", "id": 30, "members": [
                    {{"type": "way", "ref": 20, "role": "outer"}},
                    {{"type": "way", "ref": 21, "role": "inner"}}
                ], "tags": {{"type": "multipolygon", "landuse": "forest"}}}}]"#
        ));
        let collection = convert(&input);
        assert_eq!(collection.features.len(), 1);
        let relation = &collection.features[0];
        assert_eq!(id(relation), "relation/30");

        let outer = vec![vec![0.0, 0.0], vec![4.0, 0.0], vec![4.0, 4.0], vec![0.0, 4.0], vec![0.0, 0.0]];
        let inner = vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![1.0, 2.0], vec![1.0, 1.0]];
        assert_eq!(geometry(relation), &Value::Polygon(vec![outer, inner]));
        assert_eq!(relation.properties.as_ref().unwrap().get("landuse"), Some(&serde_json::json!("forest")));
    }

    #[test]
    fn test_multipolygon_with_several_outers_drops_inners() {
        let input = elements(&format!(
            r#"[{HOLE_NODES},
                {{"type": "way", "id": 20, "nodes": [1, 2, 3, 4, 1]}},
                {{"type": "way", "id": 21, "nodes": [5, 6, 7, 5]}},
                {{"type": "way", "id": 22, "nodes": [2, 3, 4, 2]}},
                {{"type": "relation", "id": 31, "members": [
                    {{"type": "way", "ref": 20, "role": "outer"}},
                    {{"type": "way", "ref": 22, "role": "outer"}},
                    {{"type": "way", "ref": 21, "role": "inner"}}
                ], "tags": {{"type": "multipolygon"}}}}]"#
        ));
        let collection = convert(&input);
        assert_eq!(collection.features.len(), 1);
        let relation = &collection.features[0];
        assert_eq!(id(relation), "relation/31");

        let Value::MultiPolygon(polygons) = geometry(relation) else { panic!("expected multipolygon") };
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().all(|polygon| polygon.len() == 1));
    }

    #[test]
    fn test_multipolygon_without_usable_outer_is_skipped() {
        let input = elements(&format!(
            r#"[{HOLE_NODES},
                {{"type": "way", "id": 23, "nodes": [1, 2, 1]}},
                {{"type": "relation", "id": 32, "members": [
                    {{"type": "way", "ref": 23, "role": "outer"}},
                    {{"type": "way", "ref": 999, "role": "outer"}}
                ], "tags": {{"type": "multipolygon"}}}}]"#
        ));
        let collection = convert(&input);
        assert!(collection.features.is_empty());
    }

    #[test]
    fn test_boundary_relation_concatenates_members() {
        let input = elements(&format!(
            r#"[{SQUARE_NODES},
                {{"type": "way", "id": 40, "nodes": [1, 2]}},
                {{"type": "way", "id": 41, "nodes": [3, 4]}},
                {{"type": "relation", "id": 50, "members": [
                    {{"type": "way", "ref": 41, "role": "outer"}},
                    {{"type": "node", "ref": 1, "role": "admin_centre"}},
                    {{"type": "way", "ref": 40, "role": "outer"}}
                ], "tags": {{"boundary": "administrative"}}}}]"#
        ));
        let collection = convert(&input);
        assert_eq!(collection.features.len(), 1);
        let relation = &collection.features[0];
        assert_eq!(id(relation), "relation/50");
        assert_eq!(
            geometry(relation),
            &Value::LineString(vec![vec![1.0, 1.0], vec![0.0, 1.0], vec![0.0, 0.0], vec![1.0, 0.0]])
        );
    }

    #[test]
    fn test_other_relations_are_skipped() {
        let input = elements(&format!(
            r#"[{SQUARE_NODES},
                {{"type": "way", "id": 40, "nodes": [1, 2], "tags": {{"highway": "primary"}}}},
                {{"type": "relation", "id": 60, "members": [{{"type": "way", "ref": 40, "role": ""}}],
                  "tags": {{"type": "route", "route": "bus"}}}},
                {{"type": "area", "id": 3600000001}}]"#
        ));
        let collection = convert(&input);
        assert!(collection.features.iter().all(|f| id(f) != "relation/60"));
        assert_eq!(collection.features.len(), 1);
        assert_eq!(id(&collection.features[0]), "way/40");
    }

    #[test]
    fn test_output_order_follows_input() {
        let input = elements(&format!(
            r#"[{{"type": "way", "id": 10, "nodes": [1, 2], "tags": {{"highway": "path"}}}},
                {{"type": "way", "id": 11, "nodes": [2, 3]}},
                {{"type": "node", "id": 9, "lon": 5, "lat": 5, "tags": {{"shop": "bakery"}}}},
                {SQUARE_NODES},
                {{"type": "way", "id": 12, "nodes": [3, 4], "tags": {{"highway": "path"}}}}]"#
        ));
        let ids: Vec<String> = convert(&input).features.iter().map(|f| id(f).to_string()).collect();
        assert_eq!(ids, vec!["way/10", "node/9", "way/12"]);
    }
}
