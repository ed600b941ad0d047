//! Sequential traversal: follow next references one page at a time.

use super::{Engine, PageParser, PageSource, ParsedPage, Presenter, RawPage, StopReason, TraversalOutcome};
use super::state::TraversalState;

impl<S: PageSource, P: PageParser> Engine<S, P> {
    /// Traverse by following each page's next reference.
    ///
    /// Stops at the terminal page, at `max_pages`, or at the first page that
    /// cannot be retrieved or parsed. The histogram gathered so far is
    /// returned in every case and a final snapshot is always emitted.
    pub async fn run_sequential(&self, initial: RawPage, presenter: &mut dyn Presenter) -> TraversalOutcome {
        let mut state = TraversalState::new(self.options.max_pages);

        let page = match self.parser.parse(&initial) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("initial page {} could not be parsed: {}", initial.location, e);
                return state.finish(StopReason::Failed, presenter);
            }
        };

        let stop = self.continue_sequential(&mut state, page, presenter).await;
        state.finish(stop, presenter)
    }

    /// Merge `page` and keep following next references.
    pub(super) async fn continue_sequential(
        &self, state: &mut TraversalState, mut page: ParsedPage, presenter: &mut dyn Presenter,
    ) -> StopReason {
        loop {
            if !state.try_reserve() {
                return StopReason::BudgetExhausted;
            }
            state.merge(&page.counts);
            state.snapshot(presenter);

            let Some(next) = page.next.take() else {
                return StopReason::Terminal;
            };

            if state.budget_exhausted() {
                return StopReason::BudgetExhausted;
            }

            page = match self.fetch_page(&next).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("page {} unavailable, keeping partial histogram: {}", next, e);
                    return StopReason::Failed;
                }
            };
            tracing::debug!("fetched page {}", next);
        }
    }
}
