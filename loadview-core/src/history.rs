use std::collections::VecDeque;
use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::{CumulativeTotals, Error, Result};

/// Samples kept for charting.
pub const HISTORY_CAPACITY: usize = 50;

/// Largest window a session may ask for.
pub const MAX_HISTORY_CAPACITY: usize = 100_000;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Cumulative totals as of one applied delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// 1-based position of the producing delta within the session.
    pub seq: u64,
    pub timestamp: String,
    pub accepted: u64,
    pub rejected: u64,
    pub errors: u64,
}

impl Sample {
    pub fn new<Tz>(seq: u64, at: &DateTime<Tz>, totals: CumulativeTotals) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            seq,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            accepted: totals.accepted,
            rejected: totals.rejected,
            errors: totals.errors,
        }
    }

    #[must_use]
    pub fn totals(&self) -> CumulativeTotals {
        CumulativeTotals::new(self.accepted, self.rejected, self.errors)
    }
}

/// Sliding window over the most recent samples, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::bounded(HISTORY_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if !(1..=MAX_HISTORY_CAPACITY).contains(&capacity) {
            return Err(Error::InvalidCapacity);
        }
        Ok(Self::bounded(capacity))
    }

    fn bounded(capacity: usize) -> Self {
        Self {
            // Large windows grow on demand.
            samples: VecDeque::with_capacity(capacity.min(HISTORY_CAPACITY) + 1),
            capacity,
        }
    }

    /// Appends `sample` and returns how many of the oldest entries were evicted.
    pub(crate) fn push(&mut self, sample: Sample) -> usize {
        self.samples.push_back(sample);
        let mut evicted = 0;
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn oldest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Sample;
    type IntoIter = std::collections::vec_deque::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
