//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MCP_OSM_*)
//! 2. TOML config file (if MCP_OSM_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::bbox::DEFAULT_AREA_WARNING_THRESHOLD;
use crate::cache::CacheConfig;

mod validation;

pub use validation::ConfigError;

/// One upstream query endpoint as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Full transport URL including the interpreter path. May use an IP literal.
    pub url: String,

    /// DNS name sent as the `Host` header.
    pub host: String,
}

impl EndpointConfig {
    fn new(url: &str, host: &str) -> Self {
        Self { url: url.into(), host: host.into() }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MCP_OSM_*)
/// 2. TOML config file (if MCP_OSM_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ordered upstream endpoints. The first entry is preferred at startup.
    ///
    /// Usually set as `[[endpoints]]` tables in the TOML file.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointConfig>,

    /// User-Agent string for upstream requests.
    ///
    /// Set via MCP_OSM_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-attempt HTTP timeout in milliseconds.
    ///
    /// Set via MCP_OSM_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Base delay for rate-limit backoff in milliseconds.
    ///
    /// Set via MCP_OSM_BACKOFF_BASE_MS environment variable.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for rate-limit backoff in milliseconds.
    ///
    /// Set via MCP_OSM_BACKOFF_MAX_MS environment variable.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Fixed delay after an upstream 5xx in milliseconds.
    ///
    /// Set via MCP_OSM_SERVER_ERROR_DELAY_MS environment variable.
    #[serde(default = "default_server_error_delay_ms")]
    pub server_error_delay_ms: u64,

    /// Cache entry time-to-live in seconds.
    ///
    /// Set via MCP_OSM_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached responses.
    ///
    /// Set via MCP_OSM_CACHE_MAX_ENTRIES environment variable.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Interval between background cache sweeps in seconds.
    ///
    /// Set via MCP_OSM_CACHE_SWEEP_INTERVAL_SECS environment variable.
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,

    /// Bounding box area (square degrees) above which a warning is emitted.
    ///
    /// Set via MCP_OSM_AREA_WARNING_THRESHOLD environment variable.
    #[serde(default = "default_area_warning_threshold")]
    pub area_warning_threshold: f64,

    /// Server-side `[timeout:]` directive for generated queries, in seconds.
    ///
    /// Set via MCP_OSM_QUERY_TIMEOUT_SECS environment variable.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u32,

    /// Server-side `[maxsize:]` directive for generated queries, in bytes.
    ///
    /// Set via MCP_OSM_QUERY_MAX_MEMORY_BYTES environment variable.
    #[serde(default)]
    pub query_max_memory_bytes: Option<u64>,
}

fn default_endpoints() -> Vec<EndpointConfig> {
    vec![
        EndpointConfig::new("https://162.55.144.139/api/interpreter", "overpass-api.de"),
        EndpointConfig::new("https://65.109.112.52/api/interpreter", "overpass-api.de"),
        EndpointConfig::new("https://overpass.private.coffee/api/interpreter", "overpass.private.coffee"),
    ]
}

fn default_user_agent() -> String {
    "mcp-osm/0.1".into()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    16_000
}

fn default_server_error_delay_ms() -> u64 {
    500
}

fn default_cache_ttl_secs() -> u64 {
    15 * 60
}

fn default_cache_max_entries() -> usize {
    100
}

fn default_cache_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_area_warning_threshold() -> f64 {
    DEFAULT_AREA_WARNING_THRESHOLD
}

fn default_query_timeout_secs() -> u32 {
    25
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            server_error_delay_ms: default_server_error_delay_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            cache_sweep_interval_secs: default_cache_sweep_interval_secs(),
            area_warning_threshold: default_area_warning_threshold(),
            query_timeout_secs: default_query_timeout_secs(),
            query_max_memory_bytes: None,
        }
    }
}

impl AppConfig {
    /// Per-attempt timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache settings derived from the flat configuration fields.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_entries: self.cache_max_entries,
            sweep_interval: Duration::from_secs(self.cache_sweep_interval_secs),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MCP_OSM_`
    /// 2. TOML file from `MCP_OSM_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MCP_OSM_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MCP_OSM_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate configuration from a prepared figment.
    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
