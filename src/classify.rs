//! Limit status and MEND depth classification

use crate::{
    fractions::{Fraction, FractionSet},
    reference::{ReferenceRange, ReferenceRanges},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a value relative to its reference range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitStatus {
    BelowLimit,
    WithinLimits,
    AboveLimit,
}

impl LimitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LimitStatus::BelowLimit => "below_limit",
            LimitStatus::WithinLimits => "within_limits",
            LimitStatus::AboveLimit => "above_limit",
        }
    }
}

impl fmt::Display for LimitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MEND depth bucket with fixed cutoffs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthBin {
    #[serde(rename = "<10M")]
    Under10M,
    #[serde(rename = "10-20M")]
    From10To20M,
    #[serde(rename = ">=20M")]
    AtLeast20M,
}

impl DepthBin {
    pub fn as_str(self) -> &'static str {
        match self {
            DepthBin::Under10M => "<10M",
            DepthBin::From10To20M => "10-20M",
            DepthBin::AtLeast20M => ">=20M",
        }
    }
}

impl fmt::Display for DepthBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a value against a range. Upper is checked first, so a value on
/// a zero-width range is above.
pub fn classify_value(value: Option<f64>, range: Option<&ReferenceRange>) -> Option<LimitStatus> {
    let value = value.filter(|v| v.is_finite())?;
    let range = range?;

    if value >= range.upper {
        Some(LimitStatus::AboveLimit)
    } else if value <= range.lower {
        Some(LimitStatus::BelowLimit)
    } else {
        Some(LimitStatus::WithinLimits)
    }
}

pub const DEPTH_LOW_CUTOFF: u64 = 10_000_000;
pub const DEPTH_HIGH_CUTOFF: u64 = 20_000_000;

/// Bucket a MEND count
pub fn classify_depth(mend: Option<u64>) -> Option<DepthBin> {
    let mend = mend?;
    if mend < DEPTH_LOW_CUTOFF {
        Some(DepthBin::Under10M)
    } else if mend < DEPTH_HIGH_CUTOFF {
        Some(DepthBin::From10To20M)
    } else {
        Some(DepthBin::AtLeast20M)
    }
}

/// Per-dimension statuses for one sample; `None` is unclassified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleClassification {
    pub sample_id: String,
    pub statuses: [Option<LimitStatus>; 4],
    pub depth_bin: Option<DepthBin>,
}

impl SampleClassification {
    pub fn status(&self, fraction: Fraction) -> Option<LimitStatus> {
        self.statuses[fraction.index()]
    }

    /// All four fractions within limits; depth is not considered
    pub fn within_overall_limits(&self) -> bool {
        self.statuses
            .iter()
            .all(|s| *s == Some(LimitStatus::WithinLimits))
    }
}

pub fn classify_sample(fractions: &FractionSet, ranges: &ReferenceRanges) -> SampleClassification {
    let statuses = Fraction::ALL.map(|f| classify_value(fractions.get(f), ranges.get(f)));

    SampleClassification {
        sample_id: fractions.sample_id.clone(),
        statuses,
        depth_bin: classify_depth(fractions.mend),
    }
}

/// Counts of each status for one fraction across the population
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub below_limit: usize,
    pub within_limits: usize,
    pub above_limit: usize,
    pub unclassified: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: Option<LimitStatus>) {
        match status {
            Some(LimitStatus::BelowLimit) => self.below_limit += 1,
            Some(LimitStatus::WithinLimits) => self.within_limits += 1,
            Some(LimitStatus::AboveLimit) => self.above_limit += 1,
            None => self.unclassified += 1,
        }
    }
}

/// Tally statuses per fraction, in `Fraction::ALL` order
pub fn count_statuses(classifications: &[SampleClassification]) -> Vec<(Fraction, StatusCounts)> {
    Fraction::ALL
        .iter()
        .map(|&fraction| {
            let mut counts = StatusCounts::default();
            for c in classifications {
                counts.add(c.status(fraction));
            }
            (fraction, counts)
        })
        .collect()
}
