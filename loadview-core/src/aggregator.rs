use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::{CumulativeTotals, Delta, History, RawDelta, Result, Sample};

/// Owns the session's totals and sample window.
///
/// All mutation goes through `&mut self`, so a reader holding `&Aggregator`
/// or a [`Snapshot`] never observes totals and history out of step.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    totals: CumulativeTotals,
    history: History,
    applied: u64,
}

/// Owned copy of aggregator state handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "cumulativeTotals")]
    pub totals: CumulativeTotals,
    pub history: Vec<Sample>,
    pub applied: u64,
}

impl Snapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            totals: CumulativeTotals::ZERO,
            history: Vec::new(),
            applied: 0,
        }
    }
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_size(size: usize) -> Result<Self> {
        Ok(Self {
            totals: CumulativeTotals::ZERO,
            history: History::with_capacity(size)?,
            applied: 0,
        })
    }

    pub fn apply(&mut self, delta: Delta) {
        self.apply_at(delta, &Local::now());
    }

    pub fn apply_at<Tz>(&mut self, delta: Delta, at: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.totals.add(&delta);
        self.applied = self.applied.saturating_add(1);
        let evicted = self
            .history
            .push(Sample::new(self.applied, at, self.totals));

        tracing::trace!(
            seq = self.applied,
            accepted = self.totals.accepted,
            rejected = self.totals.rejected,
            errors = self.totals.errors,
            evicted,
            "delta applied"
        );
    }

    /// Validates `raw` and applies it; on error nothing changes.
    pub fn try_apply(&mut self, raw: RawDelta) -> Result<Delta> {
        let delta = Delta::try_from(raw)?;
        self.apply(delta);
        Ok(delta)
    }

    pub fn totals(&self) -> CumulativeTotals {
        self.totals
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Deltas applied since the session started or was last reset.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            totals: self.totals,
            history: self.history.to_vec(),
            applied: self.applied,
        }
    }

    pub fn reset(&mut self) {
        self.totals = CumulativeTotals::ZERO;
        self.history.clear();
        self.applied = 0;
    }
}
