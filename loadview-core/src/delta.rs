use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::{Error, Result};

/// Outcome counts reported by the runner since its previous frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Delta {
    pub accepted: u64,
    pub rejected: u64,
    pub errors: u64,
}

impl Delta {
    #[must_use]
    pub const fn new(accepted: u64, rejected: u64, errors: u64) -> Self {
        Self {
            accepted,
            rejected,
            errors,
        }
    }

    #[must_use]
    pub fn outcomes(&self) -> u64 {
        self.accepted
            .saturating_add(self.rejected)
            .saturating_add(self.errors)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes() == 0
    }
}

/// A frame that parsed as JSON with the right shape, before range checks.
///
/// Fields are kept as raw JSON numbers so that `-1` or `1.5` reach validation
/// instead of failing as a shape mismatch. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDelta {
    pub accepted: Number,
    pub rejected: Number,
    pub errors: Number,
}

impl RawDelta {
    #[must_use]
    pub fn new(accepted: Number, rejected: Number, errors: Number) -> Self {
        Self {
            accepted,
            rejected,
            errors,
        }
    }
}

impl From<Delta> for RawDelta {
    fn from(d: Delta) -> Self {
        Self::new(d.accepted.into(), d.rejected.into(), d.errors.into())
    }
}

impl TryFrom<RawDelta> for Delta {
    type Error = Error;

    fn try_from(raw: RawDelta) -> Result<Self> {
        Ok(Self {
            accepted: count("accepted", &raw.accepted)?,
            rejected: count("rejected", &raw.rejected)?,
            errors: count("errors", &raw.errors)?,
        })
    }
}

fn count(field: &'static str, value: &Number) -> Result<u64> {
    value.as_u64().ok_or_else(|| Error::InvalidDelta {
        field,
        value: value.clone(),
    })
}

/// Parses a frame without range checks.
pub fn decode_raw(frame: impl AsRef<[u8]>) -> Result<RawDelta> {
    serde_json::from_slice(frame.as_ref()).map_err(Error::MalformedFrame)
}

/// Parses and validates a frame.
///
/// Invalid UTF-8, non-JSON and missing/non-numeric fields are
/// [`Error::MalformedFrame`]; negative or fractional counts are
/// [`Error::InvalidDelta`]. Counts must be JSON integers, so `2.0` is
/// rejected as well.
pub fn decode_frame(frame: impl AsRef<[u8]>) -> Result<Delta> {
    Delta::try_from(decode_raw(frame)?)
}
