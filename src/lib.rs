//! # rnaseq-qc - RNA-seq read composition QC
//!
//! Collects per-sample read counts from MEND QC reports and STAR aligner logs,
//! derives read composition fractions, and flags samples that fall outside the
//! batch's own mean ± 2 SD reference ranges or below fixed MEND depth cutoffs.

pub mod classify;
pub mod flags;
pub mod fractions;
pub mod join;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod reports;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which cross-source subset relation the joiner enforces before merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequiredSubset {
    /// Every STAR log sample must also have a MEND report
    AlignerWithinTabular,
    /// Every MEND report sample must also have a STAR log
    TabularWithinAligner,
}

impl fmt::Display for RequiredSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredSubset::AlignerWithinTabular => {
                write!(f, "STAR log IDs must be a subset of MEND report IDs")
            }
            RequiredSubset::TabularWithinAligner => {
                write!(f, "MEND report IDs must be a subset of STAR log IDs")
            }
        }
    }
}

/// Configuration parameters for QC classification
#[derive(Debug, Clone)]
pub struct QcConfig {
    pub sd_multiplier: f64, // Width of the reference range in SDs
    pub rna_library: String,
    pub sample_type: Option<String>,
    pub required_subset: RequiredSubset,
    pub num_threads: usize,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            sd_multiplier: 2.0,
            rna_library: "stranded".to_string(),
            sample_type: None,
            required_subset: RequiredSubset::AlignerWithinTabular,
            num_threads: 1,
        }
    }
}

/// Locations of every input and the output directory for one batch
#[derive(Debug, Clone)]
pub struct InputLayout {
    pub mend_dir: PathBuf,
    pub star_dir: PathBuf,
    pub mend_manifest: PathBuf,
    pub star_manifest: PathBuf,
    pub metadata: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for InputLayout {
    fn default() -> Self {
        Self {
            mend_dir: PathBuf::from("data/mend_qc"),
            star_dir: PathBuf::from("data/star_logs"),
            mend_manifest: PathBuf::from("data/mend_manifest.tsv"),
            star_manifest: PathBuf::from("data/star_manifest.tsv"),
            metadata: PathBuf::from("data/histologies.tsv"),
            output_dir: PathBuf::from("results"),
        }
    }
}

/// Error types for the rnaseq-qc library
#[derive(Debug, thiserror::Error)]
pub enum QcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid report: {0}")]
    InvalidReport(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Manifest mismatch ({direction}); missing: {}", .missing.join(", "))]
    ManifestMismatch {
        direction: RequiredSubset,
        missing: Vec<String>,
    },
}

pub type QcResult<T> = Result<T, QcError>;
