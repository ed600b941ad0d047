//! cache_prune tool implementation.
//!
//! Deletes expired and malformed entries under the configured namespace.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tally_core::HistogramCache;

use crate::tools::json_result;

/// Parameters for the cache_prune tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePruneParams {}

/// Implementation of the cache_prune tool.
pub async fn prune_impl(cache: &HistogramCache, _params: CachePruneParams) -> Result<CallToolResult, McpError> {
    let report = cache.prune_all().await?;
    tracing::info!(scanned = report.scanned, deleted = report.deleted, "cache pruned on request");
    json_result(&report)
}
