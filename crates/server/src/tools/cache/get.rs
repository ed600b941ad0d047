//! cache_get tool implementation.
//!
//! Looks up the cached histogram for a listing URL without fetching anything.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tally_client::resource_id;
use tally_core::{AppConfig, CacheKey, Error, Histogram, HistogramCache};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Any page URL of the rated listing.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub cache_key: CacheKey,
    /// Vote counts for ratings 1 through 6.
    pub histogram: Histogram,
    pub total: u64,
    /// RFC 3339 time the entry was written.
    pub created_at: String,
}

/// Implementation of the cache_get tool.
///
/// Expired and malformed entries are reported as a miss.
pub async fn get_impl(
    cache: &HistogramCache, config: &AppConfig, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let id = resource_id(&params.url, &config.parser.page_param).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = cache
        .derive_key(&id)
        .ok_or_else(|| Error::InvalidInput("url cannot be empty".into()))?;

    let entry = cache.read(&key).await?.ok_or_else(|| Error::CacheMiss(id.clone()))?;

    json_result(&CacheGetOutput {
        cache_key: key,
        histogram: entry.histogram,
        total: entry.histogram.total(),
        created_at: entry.created_at.to_rfc3339(),
    })
}
