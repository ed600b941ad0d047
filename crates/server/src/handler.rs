//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use crate::tools::{
    RatingHistogramParams,
    cache::{CacheGetParams, CachePruneParams, get_impl, prune_impl},
    histogram_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tally_client::{FetchClient, FetchConfig, HtmlRatingParser};
use tally_core::{AppConfig, Error, HistogramCache};

/// The main MCP server handler for mcp-tally.
#[derive(Clone)]
pub struct TallyServer {
    tool_router: ToolRouter<Self>,
    config: Arc<AppConfig>,
    cache: HistogramCache,
    source: Arc<FetchClient>,
    parser: Arc<HtmlRatingParser>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl TallyServer {
    /// Create a server handler sharing one HTTP client and parser across calls.
    pub fn new(config: AppConfig, cache: HistogramCache) -> Result<Self, Error> {
        let source = FetchClient::new(FetchConfig::from(&config))?;
        let parser = HtmlRatingParser::new(&config.parser)?;

        Ok(Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            cache,
            source: Arc::new(source),
            parser: Arc::new(parser),
        })
    }

    /// Aggregate the rating histogram of a paginated listing.
    #[tool(
        description = "Count ratings 1-6 across every page of a paginated review listing. Uses the cache unless refresh is set."
    )]
    async fn rating_histogram(&self, params: Parameters<RatingHistogramParams>) -> Result<CallToolResult, McpError> {
        histogram_impl(&self.cache, &self.config, self.source.as_ref(), &self.parser, params.0).await
    }

    /// Read a cached histogram without fetching.
    #[tool(description = "Return the cached rating histogram for a listing URL, or CACHE_MISS.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, &self.config, params.0).await
    }

    /// Drop expired and malformed cache entries.
    #[tool(description = "Delete expired or malformed cached histograms. Returns scanned and deleted counts.")]
    async fn cache_prune(&self, params: Parameters<CachePruneParams>) -> Result<CallToolResult, McpError> {
        prune_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for TallyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-tally".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
