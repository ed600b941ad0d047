//! Paginated aggregation engine.
//!
//! Pulls pages from a [`PageSource`], turns each into partial counts with a
//! [`PageParser`] and folds them into one [`Histogram`], reporting progress to
//! a [`Presenter`] after every merged page.
//!
//! ### Traversal strategies
//! - Sequential: follow each page's next reference in turn.
//! - Speculative: derive a [`PageTemplate`] from the initial page and keep up
//!   to `concurrency_width` index-addressed requests in flight, merging
//!   whichever finishes first.
//!
//! Both strategies honour the `max_pages` ceiling and treat source or parse
//! failures as an early stop with a partial histogram, never as an error.

mod concurrent;
mod sequential;
mod session;
mod state;

#[cfg(test)]
mod testing;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{AppConfig, Error, Histogram};
use state::TraversalState;

pub use session::{RefreshGate, RefreshTrigger, Session, SessionOrigin, SessionOutcome};

/// Opaque token identifying one page at the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageRef(String);

impl PageRef {
    pub fn new(page_ref: impl Into<String>) -> Self {
        Self(page_ref.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PageRef {
    fn from(page_ref: String) -> Self {
        Self(page_ref)
    }
}

impl From<&str> for PageRef {
    fn from(page_ref: &str) -> Self {
        Self(page_ref.to_string())
    }
}

/// Content delivered by a [`PageSource`].
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Where the content was actually served from (after redirects).
    pub location: PageRef,
    pub body: String,
}

impl RawPage {
    pub fn new(location: impl Into<PageRef>, body: impl Into<String>) -> Self {
        Self { location: location.into(), body: body.into() }
    }
}

/// One page reduced to partial counts and a continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub counts: Histogram,
    /// `None` marks the terminal page.
    pub next: Option<PageRef>,
}

impl ParsedPage {
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// Page reference pattern addressed by page index.
///
/// The pattern contains [`PageTemplate::PLACEHOLDER`] exactly where the index
/// goes, e.g. `https://example.com/reviews?page={page}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    pattern: String,
    first_index: u32,
}

impl PageTemplate {
    pub const PLACEHOLDER: &'static str = "{page}";

    /// Build a template whose first speculative page is `first_index`.
    ///
    /// Returns `None` if the pattern has no placeholder.
    pub fn new(pattern: impl Into<String>, first_index: u32) -> Option<Self> {
        let pattern = pattern.into();
        pattern
            .contains(Self::PLACEHOLDER)
            .then_some(Self { pattern, first_index })
    }

    /// Index of the page following the initial one.
    pub fn first_index(&self) -> u32 {
        self.first_index
    }

    pub fn resolve(&self, index: u32) -> PageRef {
        PageRef(self.pattern.replace(Self::PLACEHOLDER, &index.to_string()))
    }
}

/// Retrieves raw page content.
///
/// Any error means the page is unavailable; the engine does not retry.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn retrieve(&self, page_ref: &PageRef) -> Result<RawPage, Error>;
}

/// Extracts partial counts and the next page reference from raw content.
pub trait PageParser: Send + Sync {
    /// Partial counts use the same category order as [`Histogram`].
    fn parse(&self, raw: &RawPage) -> Result<ParsedPage, Error>;

    /// Index-addressed pattern for speculative traversal, derived from the
    /// initial page. `None` keeps traversal sequential.
    fn template(&self, page: &ParsedPage) -> Option<PageTemplate> {
        let _ = page;
        None
    }
}

#[async_trait::async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    async fn retrieve(&self, page_ref: &PageRef) -> Result<RawPage, Error> {
        (**self).retrieve(page_ref).await
    }
}

#[async_trait::async_trait]
impl<T: PageSource + ?Sized> PageSource for &T {
    async fn retrieve(&self, page_ref: &PageRef) -> Result<RawPage, Error> {
        (**self).retrieve(page_ref).await
    }
}

impl<T: PageParser + ?Sized> PageParser for Arc<T> {
    fn parse(&self, raw: &RawPage) -> Result<ParsedPage, Error> {
        (**self).parse(raw)
    }

    fn template(&self, page: &ParsedPage) -> Option<PageTemplate> {
        (**self).template(page)
    }
}

impl<T: PageParser + ?Sized> PageParser for &T {
    fn parse(&self, raw: &RawPage) -> Result<ParsedPage, Error> {
        (**self).parse(raw)
    }

    fn template(&self, page: &ParsedPage) -> Option<PageTemplate> {
        (**self).template(page)
    }
}

/// Advisory progress attached to every snapshot.
///
/// Only meant for sizing a display; aggregation never reads it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Pages merged so far. Under speculative traversal this is a count, not
    /// the highest page index seen.
    pub pages_merged: u32,
    pub max_pages: u32,
    /// The snapshot came from the cache rather than a traversal.
    pub from_cache: bool,
    /// Last snapshot of the traversal or session.
    pub finished: bool,
}

/// Receives histogram snapshots as aggregation proceeds.
pub trait Presenter: Send {
    fn on_snapshot(&mut self, histogram: &Histogram, progress: Progress);
}

impl<F> Presenter for F
where
    F: FnMut(&Histogram, Progress) + Send,
{
    fn on_snapshot(&mut self, histogram: &Histogram, progress: Progress) {
        self(histogram, progress)
    }
}

/// Traversal limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Iteration ceiling, initial page included.
    pub max_pages: u32,
    /// Outstanding speculative requests; 0 or 1 means sequential.
    pub concurrency_width: u32,
}

impl TraversalOptions {
    pub fn is_sequential(&self) -> bool {
        self.concurrency_width <= 1
    }
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self { max_pages: 40, concurrency_width: 6 }
    }
}

impl From<&AppConfig> for TraversalOptions {
    fn from(config: &AppConfig) -> Self {
        Self { max_pages: config.max_pages, concurrency_width: config.concurrency_width }
    }
}

/// Why a traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A page reported no next page.
    Terminal,
    /// `max_pages` pages were merged.
    BudgetExhausted,
    /// A page could not be retrieved or parsed; the histogram is partial.
    Failed,
}

/// Final result of one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalOutcome {
    pub histogram: Histogram,
    pub pages_merged: u32,
    pub stop: StopReason,
}

/// Aggregation engine over a page source and parser.
#[derive(Debug, Clone)]
pub struct Engine<S, P> {
    source: S,
    parser: P,
    options: TraversalOptions,
}

impl<S: PageSource, P: PageParser> Engine<S, P> {
    pub fn new(source: S, parser: P, options: TraversalOptions) -> Self {
        Self { source, parser, options }
    }

    pub fn options(&self) -> TraversalOptions {
        self.options
    }

    /// Retrieve the initial page, then traverse from it.
    ///
    /// An unavailable initial page yields an empty histogram stopped with
    /// [`StopReason::Failed`].
    pub async fn traverse(&self, initial: &PageRef, presenter: &mut dyn Presenter) -> TraversalOutcome {
        match self.source.retrieve(initial).await {
            Ok(raw) => self.run(raw, presenter).await,
            Err(e) => {
                tracing::warn!("initial page {} unavailable: {}", initial, e);
                TraversalState::new(self.options.max_pages).finish(StopReason::Failed, presenter)
            }
        }
    }

    /// Traverse from an already retrieved initial page using the configured
    /// strategy.
    pub async fn run(&self, initial: RawPage, presenter: &mut dyn Presenter) -> TraversalOutcome {
        if self.options.is_sequential() {
            self.run_sequential(initial, presenter).await
        } else {
            self.run_concurrent(initial, presenter).await
        }
    }

    async fn fetch_page(&self, page_ref: &PageRef) -> Result<ParsedPage, Error> {
        let raw = self.source.retrieve(page_ref).await?;
        self.parser.parse(&raw)
    }
}
