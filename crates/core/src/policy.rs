//! Size policy: the hard ceiling and the ideal band.

use serde::{Deserialize, Serialize};

use crate::error::CompressError;

/// Acceptable output sizes for one request.
///
/// Invariant: `0 < ideal_min <= ideal_max <= hard_max`, enforced by
/// [`SizePolicy::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSizePolicy", into = "RawSizePolicy")]
pub struct SizePolicy {
    hard_max: u64,
    ideal_min: u64,
    ideal_max: u64,
}

/// How an output size relates to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBand {
    /// Above the hard ceiling; never selectable.
    Oversized,
    /// Valid and inside `[ideal_min, ideal_max]`.
    Ideal,
    /// Valid but outside the ideal band (below `ideal_min`, or between
    /// `ideal_max` and `hard_max`).
    Acceptable,
}

impl SizePolicy {
    pub fn new(hard_max: u64, ideal_min: u64, ideal_max: u64) -> Result<Self, CompressError> {
        if ideal_min == 0 {
            return Err(CompressError::InvalidPolicy("ideal_min must be > 0".into()));
        }
        if ideal_min > ideal_max {
            return Err(CompressError::InvalidPolicy(format!(
                "ideal_min ({ideal_min}) must be <= ideal_max ({ideal_max})"
            )));
        }
        if ideal_max > hard_max {
            return Err(CompressError::InvalidPolicy(format!(
                "ideal_max ({ideal_max}) must be <= hard_max ({hard_max})"
            )));
        }
        Ok(Self {
            hard_max,
            ideal_min,
            ideal_max,
        })
    }

    pub fn hard_max(&self) -> u64 {
        self.hard_max
    }

    pub fn ideal_min(&self) -> u64 {
        self.ideal_min
    }

    pub fn ideal_max(&self) -> u64 {
        self.ideal_max
    }

    pub fn is_valid(&self, size_bytes: u64) -> bool {
        size_bytes <= self.hard_max
    }

    pub fn is_ideal(&self, size_bytes: u64) -> bool {
        (self.ideal_min..=self.ideal_max).contains(&size_bytes)
    }

    pub fn classify(&self, size_bytes: u64) -> SizeBand {
        if !self.is_valid(size_bytes) {
            SizeBand::Oversized
        } else if self.is_ideal(size_bytes) {
            SizeBand::Ideal
        } else {
            SizeBand::Acceptable
        }
    }
}

impl Default for SizePolicy {
    /// 2 MiB ceiling with a 1.5–1.9 MiB ideal band.
    fn default() -> Self {
        Self {
            hard_max: 2 * 1024 * 1024,
            ideal_min: 1_572_864,
            ideal_max: 1_992_294,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawSizePolicy {
    hard_max: u64,
    ideal_min: u64,
    ideal_max: u64,
}

impl TryFrom<RawSizePolicy> for SizePolicy {
    type Error = CompressError;

    fn try_from(raw: RawSizePolicy) -> Result<Self, Self::Error> {
        Self::new(raw.hard_max, raw.ideal_min, raw.ideal_max)
    }
}

impl From<SizePolicy> for RawSizePolicy {
    fn from(p: SizePolicy) -> Self {
        Self {
            hard_max: p.hard_max,
            ideal_min: p.ideal_min,
            ideal_max: p.ideal_max,
        }
    }
}
