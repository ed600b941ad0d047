//! TTL policy for cached histograms.
//!
//! Each entry is stored as JSON `{"rating": [six counts], "timestamp": <epoch ms>}`
//! under a namespaced key. An entry counts only while it is younger than the
//! TTL. Anything that fails the strict schema is treated as absent and is
//! removed by the next [`HistogramCache::prune_all`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::connection::CacheDb;
use super::hash::{CacheKey, derive_key};
use crate::{Error, Histogram};

/// Persisted layout of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    rating: Histogram,
    timestamp: i64,
}

/// A cached histogram that passed schema and TTL checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub histogram: Histogram,
    pub created_at: DateTime<Utc>,
}

/// Result of one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PruneReport {
    /// Keys examined under the namespace.
    pub scanned: u64,
    /// Keys deleted because they were expired or malformed.
    pub deleted: u64,
}

/// Histogram cache with TTL validation over a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct HistogramCache {
    db: CacheDb,
    namespace: String,
    ttl: TimeDelta,
}

impl HistogramCache {
    pub fn new(db: CacheDb, namespace: impl Into<String>, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self { db, namespace: namespace.into(), ttl }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Key for a resource under this cache's namespace.
    pub fn derive_key(&self, resource_id: &str) -> Option<CacheKey> {
        derive_key(&self.namespace, resource_id)
    }

    /// Read a valid entry.
    ///
    /// Missing, malformed and expired entries all come back as `None`.
    ///
    /// # Errors
    ///
    /// Only database failures are reported.
    pub async fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        let Some(raw) = self.db.get_entry(key.as_str()).await? else {
            return Ok(None);
        };

        let entry = self.validate(&raw, Utc::now());
        if entry.is_none() {
            tracing::debug!("cache entry {} is expired or malformed", key);
        }
        Ok(entry)
    }

    /// Overwrite the entry for `key` with `histogram`, stamped now.
    ///
    /// Returns `false` without touching storage when there is no key.
    pub async fn write(&self, key: Option<&CacheKey>, histogram: &Histogram) -> Result<bool, Error> {
        let Some(key) = key else {
            return Ok(false);
        };

        let stored = StoredEntry { rating: *histogram, timestamp: Utc::now().timestamp_millis() };
        let value = serde_json::to_string(&stored)
            .map_err(|e| Error::InvalidInput(format!("failed to encode cache entry: {e}")))?;

        self.db.put_entry(key.as_str(), &value).await?;
        tracing::debug!("cached histogram under {}", key);
        Ok(true)
    }

    /// Delete every entry under the namespace that would not survive a read.
    ///
    /// Yields to the scheduler between entries. Not transactional: an
    /// interrupted pass leaves the remaining entries for the next one.
    pub async fn prune_all(&self) -> Result<PruneReport, Error> {
        let keys = self.db.list_keys(&self.namespace).await?;
        let mut report = PruneReport::default();

        for key in keys {
            report.scanned += 1;

            let valid = match self.db.get_entry(&key).await? {
                Some(raw) => self.validate(&raw, Utc::now()).is_some(),
                None => true,
            };

            if !valid && self.db.delete_entry(&key).await? {
                report.deleted += 1;
            }

            tokio::task::yield_now().await;
        }

        Ok(report)
    }

    fn validate(&self, raw: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let stored: StoredEntry = serde_json::from_str(raw).ok()?;
        let created_at = DateTime::from_timestamp_millis(stored.timestamp)?;

        if now.signed_duration_since(created_at) > self.ttl {
            return None;
        }

        Some(CacheEntry { histogram: stored.rating, created_at })
    }
}

/// Run [`HistogramCache::prune_all`] as a background task.
pub fn spawn_prune(cache: HistogramCache) -> JoinHandle<()> {
    tokio::spawn(async move {
        match cache.prune_all().await {
            Ok(report) => tracing::info!(scanned = report.scanned, deleted = report.deleted, "cache prune finished"),
            Err(e) => tracing::warn!("cache prune failed: {}", e),
        }
    })
}
