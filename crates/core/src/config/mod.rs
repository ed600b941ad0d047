//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MCP_TALLY_*)
//! 2. TOML config file (if MCP_TALLY_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Nested parser settings use a double underscore in the environment, e.g.
//! `MCP_TALLY_PARSER__ITEM_SELECTOR`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MCP_TALLY_*)
/// 2. TOML config file (if MCP_TALLY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via MCP_TALLY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per page.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Iteration ceiling: most pages merged in one traversal, initial page included.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Outstanding speculative fetches. 0 or 1 selects sequential traversal.
    #[serde(default = "default_concurrency_width")]
    pub concurrency_width: u32,

    /// Lifetime of a cached histogram in days.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,

    /// Prefix shared by every cache key.
    #[serde(default = "default_cache_namespace")]
    pub cache_namespace: String,

    /// Whether to prune expired cache entries in the background at startup.
    #[serde(default = "default_true")]
    pub prune_on_start: bool,

    /// Where ratings live in a fetched page.
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Selectors locating rating records and pagination in an HTML page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Container that must be present for a page to count as parsed.
    #[serde(default = "default_section_selector")]
    pub section_selector: String,

    /// One element per rating record, searched inside the section.
    #[serde(default = "default_item_selector")]
    pub item_selector: String,

    /// Attribute on each item holding the rating value (1..=6).
    #[serde(default = "default_rating_attr")]
    pub rating_attr: String,

    /// Link to the next page; absent on the last page.
    #[serde(default = "default_next_selector")]
    pub next_selector: String,

    /// Query parameter carrying the page index.
    #[serde(default = "default_page_param")]
    pub page_param: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mcp-tally-cache.sqlite")
}

fn default_user_agent() -> String {
    "mcp-tally/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_pages() -> u32 {
    40
}

fn default_concurrency_width() -> u32 {
    6
}

fn default_ttl_days() -> u64 {
    7
}

fn default_cache_namespace() -> String {
    "tally:".into()
}

fn default_true() -> bool {
    true
}

fn default_section_selector() -> String {
    ".reviews".into()
}

fn default_item_selector() -> String {
    "[data-rating]".into()
}

fn default_rating_attr() -> String {
    "data-rating".into()
}

fn default_next_selector() -> String {
    r#"a[rel="next"]"#.into()
}

fn default_page_param() -> String {
    "page".into()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            section_selector: default_section_selector(),
            item_selector: default_item_selector(),
            rating_attr: default_rating_attr(),
            next_selector: default_next_selector(),
            page_param: default_page_param(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_pages: default_max_pages(),
            concurrency_width: default_concurrency_width(),
            ttl_days: default_ttl_days(),
            cache_namespace: default_cache_namespace(),
            prune_on_start: true,
            parser: ParserConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days * 24 * 60 * 60)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MCP_TALLY_`
    /// 2. TOML file from `MCP_TALLY_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("MCP_TALLY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MCP_TALLY_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
