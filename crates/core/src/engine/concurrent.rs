//! Speculative traversal with a bounded set of in-flight requests.
//!
//! Pages are addressed by index through a [`PageTemplate`] so requests for
//! later pages do not wait on earlier ones. All requests live in one
//! `FuturesUnordered` polled by the calling task: the histogram is only
//! touched between completions and needs no locking.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use super::state::TraversalState;
use super::{
    Engine, PageParser, PageRef, PageSource, PageTemplate, ParsedPage, Presenter, RawPage, StopReason,
    TraversalOutcome,
};
use crate::Error;

impl<S: PageSource, P: PageParser> Engine<S, P> {
    /// Traverse with up to `concurrency_width` speculative requests in flight.
    ///
    /// Completed pages are merged in completion order. Once a terminal page is
    /// seen no new requests are issued; in-flight ones still drain, and any
    /// result for an index past the terminal page is dropped. A failed request
    /// only loses its own page, unless nothing else is in flight, in which
    /// case the traversal stops. Falls back to sequential traversal when the
    /// parser cannot derive a [`PageTemplate`].
    pub async fn run_concurrent(&self, initial: RawPage, presenter: &mut dyn Presenter) -> TraversalOutcome {
        let mut state = TraversalState::new(self.options.max_pages);

        let first = match self.parser.parse(&initial) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("initial page {} could not be parsed: {}", initial.location, e);
                return state.finish(StopReason::Failed, presenter);
            }
        };

        if !state.try_reserve() {
            return state.finish(StopReason::BudgetExhausted, presenter);
        }
        state.merge(&first.counts);
        state.snapshot(presenter);

        let Some(next) = first.next.clone() else {
            return state.finish(StopReason::Terminal, presenter);
        };
        if state.budget_exhausted() {
            return state.finish(StopReason::BudgetExhausted, presenter);
        }

        let Some(template) = self.parser.template(&first) else {
            tracing::debug!("no page template for {}, traversing sequentially", initial.location);
            let stop = match self.fetch_page(&next).await {
                Ok(page) => self.continue_sequential(&mut state, page, presenter).await,
                Err(e) => {
                    tracing::warn!("page {} unavailable, keeping partial histogram: {}", next, e);
                    StopReason::Failed
                }
            };
            return state.finish(stop, presenter);
        };

        let stop = self.speculate(&mut state, &template, presenter).await;
        state.finish(stop, presenter)
    }

    async fn speculate(
        &self, state: &mut TraversalState, template: &PageTemplate, presenter: &mut dyn Presenter,
    ) -> StopReason {
        let width = self.options.concurrency_width.max(1) as usize;
        let mut in_flight = FuturesUnordered::new();
        let mut next_index = template.first_index();
        let mut stalled = false;

        loop {
            while state.terminal().is_none() && in_flight.len() < width && state.try_reserve() {
                let page_ref = template.resolve(next_index);
                tracing::debug!("requesting page {} ({})", next_index, page_ref);
                in_flight.push(self.fetch_indexed(next_index, page_ref));
                next_index = next_index.saturating_add(1);
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(page) => {
                    if state.is_beyond_terminal(index) {
                        tracing::debug!("discarding page {} past the terminal page", index);
                        continue;
                    }
                    if state.merge_indexed(index, &page.counts) {
                        state.snapshot(presenter);
                    }
                    if page.is_terminal() {
                        tracing::debug!("page {} is terminal, draining {} in flight", index, in_flight.len());
                        state.mark_terminal(index);
                    }
                }
                Err(e) if state.is_beyond_terminal(index) => {
                    tracing::debug!("page {} past the terminal page failed: {}", index, e);
                }
                Err(e) if in_flight.is_empty() && state.terminal().is_none() => {
                    tracing::warn!("page {} unavailable with nothing else in flight, stopping: {}", index, e);
                    stalled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("page {} unavailable, skipping it with {} in flight: {}", index, in_flight.len(), e);
                }
            }
        }

        if state.terminal().is_some() {
            StopReason::Terminal
        } else if stalled {
            StopReason::Failed
        } else {
            StopReason::BudgetExhausted
        }
    }

    async fn fetch_indexed(&self, index: u32, page_ref: PageRef) -> (u32, Result<ParsedPage, Error>) {
        (index, self.fetch_page(&page_ref).await)
    }
}
