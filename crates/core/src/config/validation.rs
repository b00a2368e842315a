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
    /// - `cache_name` or `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - `precache` is empty
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(invalid("cache_name", "must not be empty"));
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "must use http or https"));
        }
        if origin.cannot_be_a_base() {
            return Err(invalid("origin", "must be a base URL"));
        }

        if self.precache.is_empty() {
            return Err(invalid("precache", "must list at least one resource"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !fallback_precached(&origin, &self.precache, &self.offline_fallback) {
            tracing::warn!(
                fallback = %self.offline_fallback,
                "offline_fallback is not precached; network failures will get a synthesised 503"
            );
        }

        Ok(())
    }
}

/// Whether `fallback` resolves to the same URL as some precache entry.
///
/// Entries that do not resolve are ignored here; the manifest rejects them later.
fn fallback_precached(origin: &url::Url, precache: &[String], fallback: &str) -> bool {
    let Ok(fallback) = origin.join(fallback) else {
        return false;
    };
    precache
        .iter()
        .filter_map(|entry| origin.join(entry).ok())
        .any(|entry| entry == fallback)
}
