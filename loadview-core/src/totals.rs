use serde::Serialize;

use crate::Delta;

/// Running sums of every delta applied in a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CumulativeTotals {
    pub accepted: u64,
    pub rejected: u64,
    pub errors: u64,
}

impl CumulativeTotals {
    pub const ZERO: Self = Self {
        accepted: 0,
        rejected: 0,
        errors: 0,
    };

    #[must_use]
    pub const fn new(accepted: u64, rejected: u64, errors: u64) -> Self {
        Self {
            accepted,
            rejected,
            errors,
        }
    }

    pub(crate) fn add(&mut self, delta: &Delta) {
        self.accepted = self.accepted.saturating_add(delta.accepted);
        self.rejected = self.rejected.saturating_add(delta.rejected);
        self.errors = self.errors.saturating_add(delta.errors);
    }

    #[must_use]
    pub fn outcomes(&self) -> u64 {
        self.accepted
            .saturating_add(self.rejected)
            .saturating_add(self.errors)
    }

    /// Share of outcomes that were not accepted, in `0.0..=1.0`.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        let total = self.outcomes();
        if total == 0 {
            return 0.0;
        }
        (self.rejected.saturating_add(self.errors)) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates_instead_of_wrapping() {
        let mut t = CumulativeTotals::new(u64::MAX - 1, 0, 0);
        t.add(&Delta::new(5, 1, 2));
        assert_eq!(t, CumulativeTotals::new(u64::MAX, 1, 2));
    }

    #[test]
    fn failure_ratio_handles_empty_totals() {
        assert_eq!(CumulativeTotals::ZERO.failure_ratio(), 0.0);
        assert_eq!(CumulativeTotals::new(3, 1, 0).failure_ratio(), 0.25);
    }
}
