//! mcp-tally server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tally_core::{AppConfig, CacheDb, HistogramCache, cache::spawn_prune};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(db_path = %config.db_path.display(), "starting mcp-tally server on stdio transport");

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let cache = HistogramCache::new(db, config.cache_namespace.clone(), config.ttl());

    if config.prune_on_start {
        spawn_prune(cache.clone());
    }

    let handler = handler::TallyServer::new(config, cache)?;
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    Ok(())
}
