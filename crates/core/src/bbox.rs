//! Bounding box and result-limit validation.
//!
//! Runs before any network access. Fatal problems are collected into a
//! [`ValidationError`]; soft problems (large area, large limit) come back as
//! warnings alongside the normalized box so the caller can decide to proceed.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default area above which a warning is emitted, in square degrees.
pub const DEFAULT_AREA_WARNING_THRESHOLD: f64 = 0.001;

/// Smallest accepted result limit.
pub const MIN_LIMIT: i64 = 1;

/// Largest accepted result limit.
pub const MAX_LIMIT: i64 = 10_000;

/// Limits above this are accepted but flagged as slow.
pub const SLOW_LIMIT: i64 = 1_000;

/// A validated, axis-aligned bounding box in caller-facing order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Area in square degrees.
    pub fn area(&self) -> f64 {
        (self.max_lon - self.min_lon) * (self.max_lat - self.min_lat)
    }

    /// Render as the upstream spatial filter `(south,west,north,east)`.
    ///
    /// Latitude comes first, which is the reverse of the caller-facing order.
    pub fn to_overpass_filter(&self) -> String {
        format!("({},{},{},{})", self.min_lat, self.min_lon, self.max_lat, self.max_lon)
    }
}

/// A single fatal validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Non-fatal validation findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// The box is large enough that the upstream may time out.
    LargeArea { area: f64, threshold: f64 },
    /// The requested limit is accepted but may be slow.
    LargeLimit { limit: u32 },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::LargeArea { area, threshold } => write!(
                f,
                "bounding box area {area:.6} sq deg exceeds {threshold} sq deg; the upstream may time out"
            ),
            ValidationWarning::LargeLimit { limit } => {
                write!(f, "limit {limit} is above {SLOW_LIMIT}; the query may be slow")
            }
        }
    }
}

/// All fatal violations found in one validation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A bounding box that passed validation, with the normalized limit and any warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBbox {
    pub bbox: BoundingBox,
    pub limit: Option<u32>,
    pub warnings: Vec<ValidationWarning>,
}

/// Validate spatial query parameters and an optional result limit.
///
/// Boxes must lie within `[-180, 180]` x `[-90, 90]` and have strictly
/// positive extent on both axes; inverted boxes are rejected, not swapped.
///
/// # Errors
///
/// Returns `ValidationError` listing every fatal violation found.
pub fn validate_bbox(
    min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64, limit: Option<i64>, area_warning_threshold: f64,
) -> Result<ValidatedBbox, ValidationError> {
    let mut violations = Vec::new();

    check_range(&mut violations, "min_lon", min_lon, 180.0);
    check_range(&mut violations, "max_lon", max_lon, 180.0);
    check_range(&mut violations, "min_lat", min_lat, 90.0);
    check_range(&mut violations, "max_lat", max_lat, 90.0);

    if min_lon.partial_cmp(&max_lon) != Some(Ordering::Less) {
        violations.push(Violation { field: "min_lon".into(), reason: "must be strictly less than max_lon".into() });
    }
    if min_lat.partial_cmp(&max_lat) != Some(Ordering::Less) {
        violations.push(Violation { field: "min_lat".into(), reason: "must be strictly less than max_lat".into() });
    }

    let limit = match limit {
        Some(value) if !(MIN_LIMIT..=MAX_LIMIT).contains(&value) => {
            violations.push(Violation {
                field: "limit".into(),
                reason: format!("must be between {MIN_LIMIT} and {MAX_LIMIT}, got {value}"),
            });
            None
        }
        Some(value) => Some(value as u32),
        None => None,
    };

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    let bbox = BoundingBox { min_lon, min_lat, max_lon, max_lat };
    let mut warnings = Vec::new();

    let area = bbox.area();
    if area > area_warning_threshold {
        warnings.push(ValidationWarning::LargeArea { area, threshold: area_warning_threshold });
    }

    if let Some(limit) = limit
        && i64::from(limit) > SLOW_LIMIT
    {
        warnings.push(ValidationWarning::LargeLimit { limit });
    }

    for warning in &warnings {
        tracing::warn!(%warning, "bounding box validation warning");
    }

    Ok(ValidatedBbox { bbox, limit, warnings })
}

fn check_range(violations: &mut Vec<Violation>, field: &str, value: f64, bound: f64) {
    if !(-bound..=bound).contains(&value) {
        violations.push(Violation { field: field.into(), reason: format!("must be within [-{bound}, {bound}]") });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<ValidatedBbox, ValidationError> {
        validate_bbox(min_lon, min_lat, max_lon, max_lat, None, DEFAULT_AREA_WARNING_THRESHOLD)
    }

    fn fields(err: &ValidationError) -> Vec<&str> {
        err.violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn test_valid_small_box() {
        let result = validate(13.40, 52.51, 13.41, 52.52).unwrap();
        assert_eq!(result.bbox.min_lon, 13.40);
        assert_eq!(result.bbox.max_lat, 52.52);
        assert!(result.warnings.is_empty());
        assert!(result.limit.is_none());
    }

    #[test]
    fn test_valid_boxes_across_domain() {
        let boxes = [
            (-180.0, -90.0, 180.0, 90.0),
            (-0.001, -0.001, 0.001, 0.001),
            (179.0, 89.0, 180.0, 90.0),
            (-180.0, -90.0, -179.999, -89.999),
        ];
        for (min_lon, min_lat, max_lon, max_lat) in boxes {
            assert!(validate(min_lon, min_lat, max_lon, max_lat).is_ok(), "{min_lon},{min_lat},{max_lon},{max_lat}");
        }
    }

    #[test]
    fn test_longitude_out_of_range() {
        let err = validate(-181.0, 0.0, 1.0, 1.0).unwrap_err();
        assert_eq!(fields(&err), vec!["min_lon"]);

        let err = validate(0.0, 0.0, 180.5, 1.0).unwrap_err();
        assert_eq!(fields(&err), vec!["max_lon"]);
    }

    #[test]
    fn test_latitude_out_of_range() {
        let err = validate(0.0, -90.5, 1.0, 1.0).unwrap_err();
        assert_eq!(fields(&err), vec!["min_lat"]);

        let err = validate(0.0, 0.0, 1.0, 91.0).unwrap_err();
        assert_eq!(fields(&err), vec!["max_lat"]);
    }

    #[test]
    fn test_nan_is_rejected() {
        let err = validate(f64::NAN, 0.0, 1.0, 1.0).unwrap_err();
        assert!(fields(&err).contains(&"min_lon"));
    }

    #[test]
    fn test_inverted_box_is_rejected_not_swapped() {
        let err = validate(1.0, 1.0, 0.0, 0.0).unwrap_err();
        assert_eq!(fields(&err), vec!["min_lon", "min_lat"]);
    }

    #[test]
    fn test_zero_area_box_is_rejected() {
        let err = validate(1.0, 0.0, 1.0, 1.0).unwrap_err();
        assert_eq!(fields(&err), vec!["min_lon"]);

        let err = validate(0.0, 1.0, 1.0, 1.0).unwrap_err();
        assert_eq!(fields(&err), vec!["min_lat"]);
    }

    #[test]
    fn test_all_violations_are_reported() {
        let err = validate_bbox(200.0, -100.0, 0.0, 0.0, Some(0), 0.001).unwrap_err();
        assert_eq!(fields(&err), vec!["min_lon", "min_lat", "min_lon", "limit"]);
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_large_area_warns_but_passes() {
        let result = validate(0.0, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(result.warnings[0], ValidationWarning::LargeArea { area, .. } if area == 1.0));
    }

    #[test]
    fn test_area_threshold_is_configurable() {
        let result = validate_bbox(0.0, 0.0, 1.0, 1.0, None, 2.0).unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_limit_out_of_range() {
        for limit in [i64::MIN, -1, 0, 10_001, 50_000, i64::MAX] {
            let err = validate_bbox(0.0, 0.0, 0.01, 0.01, Some(limit), 0.001).unwrap_err();
            assert_eq!(fields(&err), vec!["limit"], "limit {limit}");
        }
    }

    #[test]
    fn test_limit_in_range() {
        for limit in [1, 2, 500, 1_000, 1_001, 9_999, 10_000] {
            let result = validate_bbox(0.0, 0.0, 0.01, 0.01, Some(limit), 1.0).unwrap();
            assert_eq!(result.limit, Some(limit as u32));
        }
    }

    #[test]
    fn test_large_limit_warns() {
        let result = validate_bbox(0.0, 0.0, 0.01, 0.01, Some(1_000), 1.0).unwrap();
        assert!(result.warnings.is_empty());

        let result = validate_bbox(0.0, 0.0, 0.01, 0.01, Some(1_001), 1.0).unwrap();
        assert_eq!(result.warnings, vec![ValidationWarning::LargeLimit { limit: 1_001 }]);
    }

    #[test]
    fn test_overpass_filter_is_lat_first() {
        let bbox = BoundingBox { min_lon: 13.4, min_lat: 52.5, max_lon: 13.5, max_lat: 52.6 };
        assert_eq!(bbox.to_overpass_filter(), "(52.5,13.4,52.6,13.5)");
    }
}
