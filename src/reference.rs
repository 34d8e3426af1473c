//! Batch-derived reference ranges (mean ± k·SD) per fraction

use crate::fractions::{Fraction, FractionSet};
use serde::{Deserialize, Serialize};

/// Mean of a slice, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with an n−1 denominator, `None` below two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Reference range for one fraction over the selected population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub fraction: Fraction,
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ReferenceRange {
    /// Build a range from summary statistics
    pub fn new(fraction: Fraction, n: usize, mean: f64, sd: f64, sd_multiplier: f64) -> Self {
        Self {
            fraction,
            n,
            mean,
            sd,
            lower: mean - sd_multiplier * sd,
            upper: mean + sd_multiplier * sd,
        }
    }

    /// Bound at an arbitrary number of SDs from the mean
    pub fn bound(&self, sds: f64) -> f64 {
        self.mean + sds * self.sd
    }
}

/// Estimate the range of one fraction from its finite values.
///
/// Returns `None` when fewer than two samples have a value.
pub fn estimate_range(
    fraction: Fraction,
    fractions: &[FractionSet],
    sd_multiplier: f64,
) -> Option<ReferenceRange> {
    let values: Vec<f64> = fractions.iter().filter_map(|f| f.get(fraction)).collect();

    let m = mean(&values)?;
    let sd = sample_std_dev(&values)?;
    Some(ReferenceRange::new(fraction, values.len(), m, sd, sd_multiplier))
}

/// Ranges for all four fractions, in `Fraction::ALL` order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRanges {
    ranges: Vec<(Fraction, Option<ReferenceRange>)>,
}

impl ReferenceRanges {
    pub fn estimate(fractions: &[FractionSet], sd_multiplier: f64) -> Self {
        let ranges = Fraction::ALL
            .iter()
            .map(|&fraction| {
                let range = estimate_range(fraction, fractions, sd_multiplier);
                match &range {
                    Some(r) => log::info!(
                        "{}: n={} mean={:.4} sd={:.4} range=[{:.4}, {:.4}]",
                        fraction,
                        r.n,
                        r.mean,
                        r.sd,
                        r.lower,
                        r.upper
                    ),
                    None => {
                        log::warn!("{}: fewer than two finite values, range undefined", fraction)
                    }
                }
                (fraction, range)
            })
            .collect();

        Self { ranges }
    }

    pub fn get(&self, fraction: Fraction) -> Option<&ReferenceRange> {
        self.ranges
            .iter()
            .find(|(f, _)| *f == fraction)
            .and_then(|(_, r)| r.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Fraction, Option<&ReferenceRange>)> + '_ {
        self.ranges.iter().map(|(f, r)| (*f, r.as_ref()))
    }
}
