//! Client code for mcp-tally.
//!
//! This crate provides the concrete collaborators of the aggregation engine:
//! an HTTP page source and an HTML rating page parser.

pub mod fetch;
pub mod parse;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, UrlError, canonicalize, resource_id};
pub use parse::HtmlRatingParser;
