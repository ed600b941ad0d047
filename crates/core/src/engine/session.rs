//! One aggregation session for a resource: cache lookup, optional refresh,
//! traversal and cache write-back.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{Engine, PageParser, PageRef, PageSource, Presenter, Progress, StopReason};
use crate::Histogram;
use crate::cache::{CacheKey, HistogramCache};

/// Fires a [`RefreshGate`]. Dropping it without firing closes the gate.
#[derive(Debug)]
pub struct RefreshTrigger(oneshot::Sender<()>);

impl RefreshTrigger {
    pub fn trigger(self) {
        let _ = self.0.send(());
    }
}

/// One-shot gate deciding whether a cached histogram is recomputed.
#[derive(Debug)]
pub struct RefreshGate(Option<oneshot::Receiver<()>>);

impl RefreshGate {
    /// A gate opened by the returned trigger.
    pub fn channel() -> (RefreshTrigger, RefreshGate) {
        let (tx, rx) = oneshot::channel();
        (RefreshTrigger(tx), RefreshGate(Some(rx)))
    }

    /// A gate that is never opened; cached results are final.
    pub fn never() -> Self {
        Self(None)
    }

    /// A gate that is already open; cached results are always recomputed.
    pub fn triggered() -> Self {
        let (trigger, gate) = Self::channel();
        trigger.trigger();
        gate
    }

    /// Wait until the trigger fires (`true`) or is dropped (`false`).
    pub async fn wait(self) -> bool {
        match self.0 {
            Some(rx) => rx.await.is_ok(),
            None => false,
        }
    }
}

/// Where a session's final histogram came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "stop")]
pub enum SessionOrigin {
    Cache,
    Traversal(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub histogram: Histogram,
    /// Pages merged by this session's traversal; 0 when served from cache.
    pub pages_merged: u32,
    pub origin: SessionOrigin,
    pub cache_key: Option<CacheKey>,
    pub cache_written: bool,
}

/// Runs the engine for one resource behind the histogram cache.
pub struct Session<'a, S, P> {
    engine: &'a Engine<S, P>,
    cache: &'a HistogramCache,
    key: Option<CacheKey>,
}

impl<'a, S: PageSource, P: PageParser> Session<'a, S, P> {
    /// Caching is disabled for the session when no key can be derived from
    /// `resource_id`.
    pub fn new(engine: &'a Engine<S, P>, cache: &'a HistogramCache, resource_id: &str) -> Self {
        let key = cache.derive_key(resource_id);
        if key.is_none() {
            tracing::debug!("no cache key for resource, caching disabled for this session");
        }
        Self { engine, cache, key }
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    /// Serve a valid cached histogram, or traverse from `initial` and cache
    /// the result.
    ///
    /// A cache hit is emitted as a snapshot before waiting on `gate`; if the
    /// gate stays shut a second, finished snapshot closes the session. If it
    /// opens, the histogram starts over from zero and the fresh result
    /// overwrites the entry. Cache failures only disable caching.
    pub async fn run(&self, initial: &PageRef, presenter: &mut dyn Presenter, gate: RefreshGate) -> SessionOutcome {
        if let Some(cached) = self.read_cached().await {
            let progress = Progress {
                pages_merged: 0,
                max_pages: self.engine.options().max_pages,
                from_cache: true,
                finished: false,
            };
            presenter.on_snapshot(&cached, progress);

            if !gate.wait().await {
                tracing::debug!("serving cached histogram for {}", initial);
                presenter.on_snapshot(&cached, Progress { finished: true, ..progress });
                return SessionOutcome {
                    histogram: cached,
                    pages_merged: 0,
                    origin: SessionOrigin::Cache,
                    cache_key: self.key.clone(),
                    cache_written: false,
                };
            }
            tracing::info!("refresh requested for {}", initial);
        }

        let outcome = self.engine.traverse(initial, presenter).await;

        let cache_written = if outcome.pages_merged == 0 {
            false
        } else {
            match self.cache.write(self.key.as_ref(), &outcome.histogram).await {
                Ok(written) => written,
                Err(e) => {
                    tracing::warn!("failed to cache histogram: {}", e);
                    false
                }
            }
        };

        tracing::info!(
            pages = outcome.pages_merged,
            total = outcome.histogram.total(),
            stop = ?outcome.stop,
            cache_written,
            "aggregated {}",
            initial
        );

        SessionOutcome {
            histogram: outcome.histogram,
            pages_merged: outcome.pages_merged,
            origin: SessionOrigin::Traversal(outcome.stop),
            cache_key: self.key.clone(),
            cache_written,
        }
    }

    async fn read_cached(&self) -> Option<Histogram> {
        let key = self.key.as_ref()?;
        match self.cache.read(key).await {
            Ok(entry) => entry.map(|e| e.histogram),
            Err(e) => {
                tracing::warn!("cache read failed, treating as miss: {}", e);
                None
            }
        }
    }
}
