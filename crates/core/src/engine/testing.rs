//! In-memory page source and parser for engine tests.
//!
//! Page `n` lives at `page:n`; its body is `c0,c1,c2,c3,c4,c5|<next ref>`
//! with an empty next ref on the terminal page.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{PageParser, PageRef, PageSource, PageTemplate, ParsedPage, Presenter, Progress, RawPage};
use crate::{Error, Histogram};

pub(crate) fn h(counts: [u64; 6]) -> Histogram {
    Histogram::new(counts)
}

#[derive(Default)]
pub(crate) struct FakeSite {
    pages: Vec<Histogram>,
    endless: bool,
    beyond_end: Histogram,
    delays: HashMap<u32, u64>,
    failing: HashSet<u32>,
    garbled: HashSet<u32>,
    requests: Mutex<Vec<u32>>,
}

impl FakeSite {
    pub(crate) fn new(pages: Vec<Histogram>) -> Self {
        Self { pages, ..Default::default() }
    }

    pub(crate) fn three_pages() -> Self {
        Self::new(vec![h([1, 0, 0, 0, 0, 0]), h([0, 2, 0, 0, 0, 0]), h([0, 0, 0, 0, 0, 3])])
    }

    /// Every page carries `page` and links to another.
    pub(crate) fn endless(page: Histogram) -> Self {
        Self { pages: vec![page], endless: true, ..Default::default() }
    }

    pub(crate) fn failing(mut self, indices: &[u32]) -> Self {
        self.failing.extend(indices);
        self
    }

    pub(crate) fn garbled(mut self, indices: &[u32]) -> Self {
        self.garbled.extend(indices);
        self
    }

    /// Per-index latency in milliseconds.
    pub(crate) fn delays(mut self, delays: &[(u32, u64)]) -> Self {
        self.delays.extend(delays.iter().copied());
        self
    }

    /// Counts served, as a terminal page, for indices past the last page.
    pub(crate) fn beyond_end(mut self, counts: Histogram) -> Self {
        self.beyond_end = counts;
        self
    }

    pub(crate) fn sum(pages: &[Histogram]) -> Histogram {
        pages.iter().fold(Histogram::zero(), |mut acc, page| {
            acc.merge(page);
            acc
        })
    }

    pub(crate) fn initial(&self) -> RawPage {
        self.render(0)
    }

    pub(crate) fn initial_ref() -> PageRef {
        PageRef::from("page:0")
    }

    /// Indices requested so far, sorted.
    pub(crate) fn requests(&self) -> Vec<u32> {
        let mut requests = self.requests.lock().unwrap().clone();
        requests.sort_unstable();
        requests
    }

    fn render(&self, index: u32) -> RawPage {
        let location = format!("page:{index}");
        if self.garbled.contains(&index) {
            return RawPage::new(location, "garbage");
        }

        let position = index as usize;
        let (counts, has_next) = if self.endless {
            (self.pages[position % self.pages.len()], true)
        } else if position < self.pages.len() {
            (self.pages[position], position + 1 < self.pages.len())
        } else {
            (self.beyond_end, false)
        };

        let csv = counts.counts().iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let next = if has_next { format!("page:{}", index + 1) } else { String::new() };
        RawPage::new(location, format!("{csv}|{next}"))
    }
}

#[async_trait::async_trait]
impl PageSource for FakeSite {
    async fn retrieve(&self, page_ref: &PageRef) -> Result<RawPage, Error> {
        let index: u32 = page_ref
            .as_str()
            .strip_prefix("page:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| Error::SourceUnavailable(format!("unknown page {page_ref}")))?;

        self.requests.lock().unwrap().push(index);

        if let Some(ms) = self.delays.get(&index) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }

        if self.failing.contains(&index) {
            return Err(Error::SourceUnavailable(format!("{page_ref} is down")));
        }

        Ok(self.render(index))
    }
}

pub(crate) struct FakeParser {
    templates: bool,
}

impl Default for FakeParser {
    fn default() -> Self {
        Self { templates: true }
    }
}

impl FakeParser {
    pub(crate) fn without_template() -> Self {
        Self { templates: false }
    }
}

impl PageParser for FakeParser {
    fn parse(&self, raw: &RawPage) -> Result<ParsedPage, Error> {
        let (csv, next) = raw
            .body
            .split_once('|')
            .ok_or_else(|| Error::ParseFailed(format!("no rating section in {}", raw.location)))?;

        let values = csv
            .split(',')
            .map(|n| n.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::ParseFailed(e.to_string()))?;
        let counts = Histogram::try_from(values.as_slice()).map_err(|e| Error::ParseFailed(e.to_string()))?;

        let next = (!next.is_empty()).then(|| PageRef::from(next));
        Ok(ParsedPage { counts, next })
    }

    fn template(&self, page: &ParsedPage) -> Option<PageTemplate> {
        if !self.templates {
            return None;
        }
        let first = page.next.as_ref()?.as_str().strip_prefix("page:")?.parse().ok()?;
        PageTemplate::new("page:{page}", first)
    }
}

#[derive(Default)]
pub(crate) struct SnapshotLog {
    pub(crate) snapshots: Vec<(Histogram, Progress)>,
}

impl SnapshotLog {
    /// Every slot is non-decreasing from one snapshot to the next.
    pub(crate) fn is_monotonic(&self) -> bool {
        self.snapshots.windows(2).all(|pair| {
            let (before, after) = (pair[0].0, pair[1].0);
            before.counts().iter().zip(after.counts()).all(|(b, a)| b <= a)
        })
    }
}

impl Presenter for SnapshotLog {
    fn on_snapshot(&mut self, histogram: &Histogram, progress: Progress) {
        self.snapshots.push((*histogram, progress));
    }
}
