//! Core types and shared functionality for mcp-osm.
//!
//! This crate provides:
//! - In-memory query cache with TTL and LRU eviction
//! - Bounding box and limit validation
//! - Usage telemetry counters
//! - Unified error types
//! - Configuration structures

pub mod bbox;
pub mod cache;
pub mod config;
pub mod error;
pub mod telemetry;

pub use bbox::{BoundingBox, ValidatedBbox, ValidationError, ValidationWarning, Violation, validate_bbox};
pub use cache::{CacheConfig, CacheStats, QueryCache};
pub use config::{AppConfig, ConfigError, EndpointConfig};
pub use error::Error;
pub use telemetry::{UsageSnapshot, UsageTelemetry};
