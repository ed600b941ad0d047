//! Core types and shared functionality for mcp-tally.
//!
//! This crate provides:
//! - The fixed-arity rating [`Histogram`]
//! - Paginated aggregation engine (sequential and speculative traversal)
//! - Cache implementation with SQLite backend and TTL pruning
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod histogram;

pub use cache::{CacheDb, CacheKey, HistogramCache};
pub use config::{AppConfig, ParserConfig};
pub use engine::{
    Engine, PageParser, PageRef, PageSource, PageTemplate, ParsedPage, Presenter, Progress, RawPage, RefreshGate,
    RefreshTrigger, Session, SessionOrigin, SessionOutcome, StopReason, TraversalOptions, TraversalOutcome,
};
pub use error::Error;
pub use histogram::{CATEGORY_COUNT, Histogram};
