//! Combine per-dimension statuses into one summary flag per sample

use crate::{
    classify::{DepthBin, LimitStatus, SampleClassification},
    fractions::Fraction,
};
use serde::{Deserialize, Serialize};

pub const NOT_FLAGGED: &str = "not flagged";

/// Final flag for one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFlag {
    pub sample_id: String,
    pub fraction_codes: String,
    pub depth_code: String,
    pub summary_flag_status: String,
}

/// Comma-joined codes of every classified fraction that is outside its range.
/// Unclassified fractions contribute nothing.
pub fn fraction_codes(classification: &SampleClassification) -> String {
    Fraction::ALL
        .iter()
        .filter(|&&f| {
            matches!(
                classification.status(f),
                Some(LimitStatus::BelowLimit) | Some(LimitStatus::AboveLimit)
            )
        })
        .map(|f| f.code())
        .collect::<Vec<_>>()
        .join(",")
}

/// Depth code; the highest bin and an unknown depth carry no code
pub fn depth_code(depth_bin: Option<DepthBin>) -> &'static str {
    match depth_bin {
        Some(DepthBin::Under10M) => "<10M MEND",
        Some(DepthBin::From10To20M) => "10-20M MEND",
        Some(DepthBin::AtLeast20M) | None => "",
    }
}

pub fn summary_flag(fraction_codes: &str, depth_code: &str) -> String {
    match (fraction_codes.is_empty(), depth_code.is_empty()) {
        (true, true) => NOT_FLAGGED.to_string(),
        (false, true) => fraction_codes.to_string(),
        (true, false) => depth_code.to_string(),
        (false, false) => format!("{}, {}", fraction_codes, depth_code),
    }
}

pub fn flag_sample(classification: &SampleClassification) -> SampleFlag {
    let fraction_codes = fraction_codes(classification);
    let depth_code = depth_code(classification.depth_bin).to_string();
    let summary_flag_status = summary_flag(&fraction_codes, &depth_code);

    SampleFlag {
        sample_id: classification.sample_id.clone(),
        fraction_codes,
        depth_code,
        summary_flag_status,
    }
}
