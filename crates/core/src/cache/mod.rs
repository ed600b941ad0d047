//! SQLite-backed cache for aggregated rating histograms.
//!
//! - Namespaced, digest-derived keys ([`hash`])
//! - Raw key/value storage with versioned migrations ([`entries`], [`migrations`])
//! - TTL validation and cooperative pruning ([`store`])
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::{CacheKey, derive_key};
pub use store::{CacheEntry, HistogramCache, PruneReport, spawn_prune};
