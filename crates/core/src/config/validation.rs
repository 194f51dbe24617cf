//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `endpoints` is empty, or an entry has a non-http(s) url or an empty host
    /// - `timeout_ms` is below 1s or exceeds 5 minutes
    /// - backoff delays are zero, inverted, or unreasonably long
    /// - any cache setting is zero
    /// - `area_warning_threshold` is not a positive finite number
    /// - `query_timeout_secs` or `query_max_memory_bytes` is out of range
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(invalid("endpoints", "at least one endpoint is required"));
        }
        for endpoint in &self.endpoints {
            if !(endpoint.url.starts_with("https://") || endpoint.url.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    field: "endpoints.url".into(),
                    reason: format!("{} must use http or https", endpoint.url),
                });
            }
            if endpoint.host.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "endpoints.host".into(),
                    reason: format!("host for {} must not be empty", endpoint.url),
                });
            }
        }

        if self.timeout_ms < 1_000 {
            return Err(invalid("timeout_ms", "must be at least 1000ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.backoff_base_ms == 0 {
            return Err(invalid("backoff_base_ms", "must be greater than 0"));
        }
        if self.backoff_max_ms > 120_000 {
            return Err(invalid("backoff_max_ms", "must not exceed 2 minutes (120000ms)"));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(invalid("backoff_base_ms", "must not exceed backoff_max_ms"));
        }
        if self.server_error_delay_ms > 60_000 {
            return Err(invalid("server_error_delay_ms", "must not exceed 1 minute (60000ms)"));
        }

        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be greater than 0"));
        }
        if self.cache_max_entries == 0 {
            return Err(invalid("cache_max_entries", "must be greater than 0"));
        }
        if self.cache_sweep_interval_secs == 0 {
            return Err(invalid("cache_sweep_interval_secs", "must be greater than 0"));
        }

        if !self.area_warning_threshold.is_finite() || self.area_warning_threshold <= 0.0 {
            return Err(invalid("area_warning_threshold", "must be a positive number"));
        }

        if !(1..=3_600).contains(&self.query_timeout_secs) {
            return Err(invalid("query_timeout_secs", "must be between 1 and 3600"));
        }
        if self.query_max_memory_bytes == Some(0) {
            return Err(invalid("query_max_memory_bytes", "must be greater than 0 when set"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.cache_sweep_interval_secs > self.cache_ttl_secs {
            tracing::warn!(
                sweep_interval_secs = self.cache_sweep_interval_secs,
                ttl_secs = self.cache_ttl_secs,
                "cache sweep interval is longer than the TTL; stale entries may linger until looked up"
            );
        }

        Ok(())
    }
}
