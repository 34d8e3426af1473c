//! Population selection and read composition fractions

use crate::{join::CombinedSample, manifest::SampleMetadata, QcConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The four composition fractions, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Fraction {
    UnmappedOfTotal,
    MultimappedOfMapped,
    DupeOfMapped,
    NonexonicOfNondupe,
}

impl Fraction {
    pub const ALL: [Fraction; 4] = [
        Fraction::UnmappedOfTotal,
        Fraction::MultimappedOfMapped,
        Fraction::DupeOfMapped,
        Fraction::NonexonicOfNondupe,
    ];

    /// Position in `Fraction::ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used in output tables
    pub fn name(self) -> &'static str {
        match self {
            Fraction::UnmappedOfTotal => "frac_unmapped_of_total",
            Fraction::MultimappedOfMapped => "frac_multimapped_of_mapped",
            Fraction::DupeOfMapped => "frac_dupe_of_mapped",
            Fraction::NonexonicOfNondupe => "frac_nonexonic_of_nondupe",
        }
    }

    /// Short code used in the summary flag
    pub fn code(self) -> &'static str {
        match self {
            Fraction::UnmappedOfTotal => "NM",
            Fraction::MultimappedOfMapped => "MM",
            Fraction::DupeOfMapped => "D",
            Fraction::NonexonicOfNondupe => "NE",
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fractions for one sample; `None` marks a value that cannot be classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionSet {
    pub sample_id: String,
    pub frac_unmapped_of_total: Option<f64>,
    pub frac_multimapped_of_mapped: Option<f64>,
    pub frac_dupe_of_mapped: Option<f64>,
    pub frac_nonexonic_of_nondupe: Option<f64>,
    pub mend: Option<u64>,
}

impl FractionSet {
    pub fn get(&self, fraction: Fraction) -> Option<f64> {
        match fraction {
            Fraction::UnmappedOfTotal => self.frac_unmapped_of_total,
            Fraction::MultimappedOfMapped => self.frac_multimapped_of_mapped,
            Fraction::DupeOfMapped => self.frac_dupe_of_mapped,
            Fraction::NonexonicOfNondupe => self.frac_nonexonic_of_nondupe,
        }
    }
}

/// `numerator / denominator`, or `None` when either side is missing or the
/// quotient is not finite
pub fn ratio(numerator: Option<f64>, denominator: Option<u64>) -> Option<f64> {
    let value = numerator? / denominator? as f64;
    value.is_finite().then_some(value)
}

fn difference(a: Option<u64>, b: Option<u64>) -> Option<f64> {
    Some(a? as f64 - b? as f64)
}

/// Derive the four fractions from a joined sample
pub fn compute_fractions(sample: &CombinedSample) -> FractionSet {
    let total = sample.total_reads;
    let mapped = sample.mapped_reads;
    let mnd = sample.mnd;
    let mend = sample.mend;

    FractionSet {
        sample_id: sample.sample_id.clone(),
        frac_unmapped_of_total: ratio(difference(total, mapped), total),
        frac_multimapped_of_mapped: ratio(sample.multimapped_reads.map(|m| m as f64), mapped),
        frac_dupe_of_mapped: ratio(difference(mapped, mnd), mapped),
        frac_nonexonic_of_nondupe: ratio(difference(mnd, mend), mnd),
        mend,
    }
}

/// True when the sample's metadata matches the configured library and sample type
pub fn is_selected(metadata: &SampleMetadata, config: &QcConfig) -> bool {
    let library_matches = metadata
        .rna_library
        .as_deref()
        .map(|l| l.eq_ignore_ascii_case(&config.rna_library))
        .unwrap_or(false);

    let type_matches = match &config.sample_type {
        Some(wanted) => metadata
            .sample_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case(wanted))
            .unwrap_or(false),
        None => true,
    };

    library_matches && type_matches
}

/// Keep the samples of the analysis population
pub fn select_population<'a>(
    samples: &'a [CombinedSample],
    metadata: &BTreeMap<String, SampleMetadata>,
    config: &QcConfig,
) -> Vec<&'a CombinedSample> {
    let mut without_metadata = 0usize;

    let selected: Vec<&CombinedSample> = samples
        .iter()
        .filter(|s| match metadata.get(&s.sample_id) {
            Some(meta) => is_selected(meta, config),
            None => {
                without_metadata += 1;
                false
            }
        })
        .collect();

    if without_metadata > 0 {
        log::warn!("{} samples have no metadata and were excluded", without_metadata);
    }
    log::info!(
        "Selected {} of {} samples with {} library",
        selected.len(),
        samples.len(),
        config.rna_library
    );

    selected
}
