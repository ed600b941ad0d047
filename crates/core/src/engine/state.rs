//! Per-traversal accumulator owned by the engine for one run.

use std::collections::BTreeSet;

use super::{Presenter, Progress, StopReason, TraversalOutcome};
use crate::Histogram;

pub(crate) struct TraversalState {
    histogram: Histogram,
    max_pages: u32,
    /// Pages merged or currently requested; never exceeds `max_pages`.
    reserved: u32,
    pages_merged: u32,
    merged_indices: BTreeSet<u32>,
    terminal: Option<u32>,
}

impl TraversalState {
    pub(crate) fn new(max_pages: u32) -> Self {
        Self {
            histogram: Histogram::zero(),
            max_pages,
            reserved: 0,
            pages_merged: 0,
            merged_indices: BTreeSet::new(),
            terminal: None,
        }
    }

    /// Claim budget for one more page.
    pub(crate) fn try_reserve(&mut self) -> bool {
        if self.reserved >= self.max_pages {
            return false;
        }
        self.reserved += 1;
        true
    }

    pub(crate) fn budget_exhausted(&self) -> bool {
        self.reserved >= self.max_pages
    }

    /// Merge a page that has no index of its own (initial or sequential page).
    pub(crate) fn merge(&mut self, counts: &Histogram) {
        self.histogram.merge(counts);
        self.pages_merged += 1;
    }

    /// Merge a speculatively fetched page. Returns false if the index was
    /// already merged.
    pub(crate) fn merge_indexed(&mut self, index: u32, counts: &Histogram) -> bool {
        if !self.merged_indices.insert(index) {
            return false;
        }
        self.merge(counts);
        true
    }

    /// Record a terminal page; the lowest terminal index wins.
    pub(crate) fn mark_terminal(&mut self, index: u32) {
        self.terminal = Some(self.terminal.map_or(index, |t| t.min(index)));
    }

    pub(crate) fn terminal(&self) -> Option<u32> {
        self.terminal
    }

    pub(crate) fn is_beyond_terminal(&self, index: u32) -> bool {
        self.terminal.is_some_and(|t| index > t)
    }

    fn progress(&self, finished: bool) -> Progress {
        Progress { pages_merged: self.pages_merged, max_pages: self.max_pages, from_cache: false, finished }
    }

    pub(crate) fn snapshot(&self, presenter: &mut dyn Presenter) {
        presenter.on_snapshot(&self.histogram, self.progress(false));
    }

    /// Emit the final snapshot and freeze the histogram.
    pub(crate) fn finish(self, stop: StopReason, presenter: &mut dyn Presenter) -> TraversalOutcome {
        presenter.on_snapshot(&self.histogram, self.progress(true));
        tracing::debug!(pages = self.pages_merged, ?stop, total = self.histogram.total(), "traversal finished");
        TraversalOutcome { histogram: self.histogram, pages_merged: self.pages_merged, stop }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_respects_budget() {
        let mut state = TraversalState::new(2);
        assert!(state.try_reserve());
        assert!(!state.budget_exhausted());
        assert!(state.try_reserve());
        assert!(state.budget_exhausted());
        assert!(!state.try_reserve());
    }

    #[test]
    fn test_zero_budget() {
        let mut state = TraversalState::new(0);
        assert!(state.budget_exhausted());
        assert!(!state.try_reserve());
    }

    #[test]
    fn test_merge_indexed_once() {
        let mut state = TraversalState::new(10);
        let page = Histogram::new([1, 0, 0, 0, 0, 0]);
        assert!(state.merge_indexed(3, &page));
        assert!(!state.merge_indexed(3, &page));
        assert_eq!(state.pages_merged, 1);
        assert_eq!(state.histogram, page);
    }

    #[test]
    fn test_lowest_terminal_wins() {
        let mut state = TraversalState::new(10);
        assert!(!state.is_beyond_terminal(100));
        state.mark_terminal(7);
        state.mark_terminal(5);
        state.mark_terminal(9);
        assert_eq!(state.terminal(), Some(5));
        assert!(state.is_beyond_terminal(6));
        assert!(!state.is_beyond_terminal(5));
    }

    #[test]
    fn test_finish_emits_final_snapshot() {
        let mut state = TraversalState::new(4);
        state.merge(&Histogram::new([0, 0, 2, 0, 0, 0]));

        let mut snapshots = Vec::new();
        let mut presenter = |h: &Histogram, p: Progress| snapshots.push((*h, p));
        let outcome = state.finish(StopReason::Terminal, &mut presenter);

        assert_eq!(outcome.histogram, Histogram::new([0, 0, 2, 0, 0, 0]));
        assert_eq!(outcome.pages_merged, 1);
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].1.finished);
    }
}
