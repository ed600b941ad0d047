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
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_pages` is 0 or exceeds 1000
    /// - `concurrency_width` exceeds 32
    /// - `ttl_days` is 0 or exceeds a year
    /// - `user_agent`, `cache_namespace` or any parser setting is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
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

        if self.max_pages == 0 {
            return Err(invalid("max_pages", "must be greater than 0"));
        }
        if self.max_pages > 1000 {
            return Err(invalid("max_pages", "must not exceed 1000"));
        }

        if self.concurrency_width > 32 {
            return Err(invalid("concurrency_width", "must not exceed 32"));
        }

        if self.ttl_days == 0 {
            return Err(invalid("ttl_days", "must be greater than 0"));
        }
        if self.ttl_days > 365 {
            return Err(invalid("ttl_days", "must not exceed 365"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.cache_namespace.is_empty() {
            return Err(invalid("cache_namespace", "must not be empty"));
        }

        let parser = &self.parser;
        for (field, value) in [
            ("parser.section_selector", &parser.section_selector),
            ("parser.item_selector", &parser.item_selector),
            ("parser.rating_attr", &parser.rating_attr),
            ("parser.next_selector", &parser.next_selector),
            ("parser.page_param", &parser.page_param),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if self.concurrency_width > self.max_pages {
            tracing::warn!(
                concurrency_width = self.concurrency_width,
                max_pages = self.max_pages,
                "concurrency_width exceeds max_pages; \
                 speculation is capped by the page budget"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: &AppConfig) -> Option<String> {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("timeout_ms"));
    }

    #[test]
    fn test_validate_max_pages_bounds() {
        let config = AppConfig { max_pages: 0, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_pages"));

        let config = AppConfig { max_pages: 1001, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("max_pages"));
    }

    #[test]
    fn test_validate_concurrency_width() {
        let config = AppConfig { concurrency_width: 0, ..Default::default() };
        assert!(config.validate().is_ok());

        let config = AppConfig { concurrency_width: 33, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("concurrency_width"));
    }

    #[test]
    fn test_validate_ttl_days() {
        let config = AppConfig { ttl_days: 0, ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("ttl_days"));
    }

    #[test]
    fn test_validate_empty_namespace() {
        let config = AppConfig { cache_namespace: String::new(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("cache_namespace"));
    }

    #[test]
    fn test_validate_empty_parser_selector() {
        let mut config = AppConfig::default();
        config.parser.item_selector = "  ".into();
        assert_eq!(invalid_field(&config).as_deref(), Some("parser.item_selector"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, max_pages: 1, ttl_days: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
