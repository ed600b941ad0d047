//! Fixed-arity rating histogram.
//!
//! Slot `i` holds the number of records carrying rating value `i + 1`. The
//! order is shared with every page parser and with the persisted cache
//! layout, so it must never change.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Number of rating categories tracked by a [`Histogram`].
pub const CATEGORY_COUNT: usize = 6;

/// Counts of records per rating category.
///
/// Serializes as a bare JSON array of exactly [`CATEGORY_COUNT`] non-negative
/// integers. Deserialization rejects any other arity or element type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct Histogram([u64; CATEGORY_COUNT]);

impl Histogram {
    pub const fn new(counts: [u64; CATEGORY_COUNT]) -> Self {
        Self(counts)
    }

    /// A histogram with every slot set to zero.
    pub const fn zero() -> Self {
        Self([0; CATEGORY_COUNT])
    }

    pub fn counts(&self) -> &[u64; CATEGORY_COUNT] {
        &self.0
    }

    /// Element-wise addition of a page's partial counts.
    ///
    /// Saturates instead of wrapping, so accumulation stays monotonic.
    pub fn merge(&mut self, partial: &Histogram) {
        for (slot, add) in self.0.iter_mut().zip(partial.0.iter()) {
            *slot = slot.saturating_add(*add);
        }
    }

    /// Record one item in `category` (zero-based). Returns false when the
    /// category is out of range.
    pub fn increment(&mut self, category: usize) -> bool {
        match self.0.get_mut(category) {
            Some(slot) => {
                *slot = slot.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.0 = [0; CATEGORY_COUNT];
    }

    pub fn total(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|n| *n == 0)
    }
}

impl From<[u64; CATEGORY_COUNT]> for Histogram {
    fn from(counts: [u64; CATEGORY_COUNT]) -> Self {
        Self(counts)
    }
}

impl TryFrom<&[u64]> for Histogram {
    type Error = Error;

    fn try_from(values: &[u64]) -> Result<Self, Self::Error> {
        let counts: [u64; CATEGORY_COUNT] = values.try_into().map_err(|_| {
            Error::InvalidInput(format!("histogram needs {CATEGORY_COUNT} categories, got {}", values.len()))
        })?;
        Ok(Self(counts))
    }
}
