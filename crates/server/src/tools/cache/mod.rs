//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and pruning the histogram cache.

pub mod get;
pub mod prune;

pub use get::{CacheGetParams, get_impl};
pub use prune::{CachePruneParams, prune_impl};
