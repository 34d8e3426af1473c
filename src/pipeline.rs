//! Batch driver: parse, join, select, estimate, classify and flag

use crate::{
    classify::{classify_sample, count_statuses, SampleClassification},
    flags::{flag_sample, SampleFlag, NOT_FLAGGED},
    fractions::{compute_fractions, select_population, FractionSet},
    join::{join_reports, CombinedSample},
    manifest::{read_manifest, read_metadata, SampleMetadata},
    reference::ReferenceRanges,
    reports::{collect_mend_reports, collect_star_logs},
    utils::{validate_file_readable, Timer},
    InputLayout, QcConfig, QcError, QcResult,
};
use std::collections::BTreeMap;

/// Every table computed for one batch
#[derive(Debug, Clone)]
pub struct QcRun {
    pub combined: Vec<CombinedSample>,
    pub fractions: Vec<FractionSet>,
    pub ranges: ReferenceRanges,
    pub classifications: Vec<SampleClassification>,
    pub flags: Vec<SampleFlag>,
}

/// Validate QC configuration parameters
pub fn validate_qc_config(config: &QcConfig) -> QcResult<()> {
    if !config.sd_multiplier.is_finite() || config.sd_multiplier <= 0.0 {
        return Err(QcError::InvalidConfig(
            "sd_multiplier must be a positive number".to_string(),
        ));
    }

    if config.rna_library.trim().is_empty() {
        return Err(QcError::InvalidConfig(
            "rna_library must not be empty".to_string(),
        ));
    }

    if config.num_threads == 0 {
        return Err(QcError::InvalidConfig(
            "num_threads must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Parse both report directories and join them through the manifests
pub fn collect_metrics(layout: &InputLayout, config: &QcConfig) -> QcResult<Vec<CombinedSample>> {
    validate_file_readable(&layout.mend_manifest)?;
    validate_file_readable(&layout.star_manifest)?;

    let _timer = Timer::new("Parsing reports");
    let mend = collect_mend_reports(&layout.mend_dir, config.num_threads)?;
    let star = collect_star_logs(&layout.star_dir, config.num_threads)?;
    log::info!("Parsed {} MEND rows and {} STAR logs", mend.len(), star.len());

    let mend_manifest = read_manifest(&layout.mend_manifest)?;
    let star_manifest = read_manifest(&layout.star_manifest)?;

    join_reports(mend, star, &mend_manifest, &star_manifest, config.required_subset)
}

/// Run the statistical stages over already joined samples
pub fn analyze(
    combined: Vec<CombinedSample>,
    metadata: &BTreeMap<String, SampleMetadata>,
    config: &QcConfig,
) -> QcRun {
    let fractions: Vec<FractionSet> = select_population(&combined, metadata, config)
        .into_iter()
        .map(compute_fractions)
        .collect();

    let ranges = ReferenceRanges::estimate(&fractions, config.sd_multiplier);

    let classifications: Vec<SampleClassification> = fractions
        .iter()
        .map(|f| classify_sample(f, &ranges))
        .collect();

    let flags: Vec<SampleFlag> = classifications.iter().map(flag_sample).collect();

    QcRun {
        combined,
        fractions,
        ranges,
        classifications,
        flags,
    }
}

/// Log a short summary of a run
pub fn log_summary(run: &QcRun) {
    let flagged = run
        .flags
        .iter()
        .filter(|f| f.summary_flag_status != NOT_FLAGGED)
        .count();
    let within = run
        .classifications
        .iter()
        .filter(|c| c.within_overall_limits())
        .count();

    log::info!("QC summary:");
    log::info!("  Samples classified: {}", run.classifications.len());
    log::info!("  Within overall limits: {}", within);
    log::info!("  Flagged: {}", flagged);

    for (fraction, counts) in count_statuses(&run.classifications) {
        log::info!(
            "  {}: below={} within={} above={} unclassified={}",
            fraction,
            counts.below_limit,
            counts.within_limits,
            counts.above_limit,
            counts.unclassified
        );
    }
}

/// Run the whole batch over an input layout
pub fn run_qc(layout: &InputLayout, config: &QcConfig) -> QcResult<QcRun> {
    validate_qc_config(config)?;
    validate_file_readable(&layout.metadata)?;

    let combined = collect_metrics(layout, config)?;
    let metadata = read_metadata(&layout.metadata)?;

    let _timer = Timer::new("Classifying samples");
    let run = analyze(combined, &metadata, config);
    log_summary(&run);

    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::{DepthBin, LimitStatus},
        output::{write_all_tables, FLAGS_FILE, RANGES_FILE},
        RequiredSubset,
    };
    use std::path::Path;
    use tempfile::tempdir;

    fn star_log(total: u64, unique: u64, multi: u64) -> String {
        format!(
            "                          Number of input reads |\t{}\n\
             \x20                  Uniquely mapped reads number |\t{}\n\
             \x20       Number of reads mapped to multiple loci |\t{}\n",
            total, unique, multi
        )
    }

    fn mend_report(mnd: u64, mend: u64) -> String {
        format!(
            "input\tuniqMappedNonDupeReadCount\testExonicUniqMappedNonDupeReadCount\tqc\n\
             x.bam\t{}\t{}\tPASS\n",
            mnd, mend
        )
    }

    /// (id, total, unique, multi, mnd, mend, library)
    type Fixture = (&'static str, u64, u64, u64, u64, u64, &'static str);

    const SAMPLES: &[Fixture] = &[
        ("BS_01", 40_000_000, 34_000_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_02", 40_000_000, 34_400_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_03", 40_000_000, 33_600_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_04", 40_000_000, 34_000_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_05", 40_000_000, 34_200_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_06", 40_000_000, 33_800_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_07", 40_000_000, 34_000_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_08", 40_000_000, 34_100_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_09", 40_000_000, 33_900_000, 2_000_000, 30_000_000, 25_000_000, "stranded"),
        ("BS_10", 40_000_000, 20_000_000, 2_000_000, 15_000_000, 9_000_000, "stranded"),
        ("BS_11", 40_000_000, 34_000_000, 2_000_000, 30_000_000, 25_000_000, "poly-A"),
    ];

    fn write_fixture(root: &Path, extra_star: Option<&str>) -> InputLayout {
        let layout = InputLayout {
            mend_dir: root.join("mend"),
            star_dir: root.join("star"),
            mend_manifest: root.join("mend_manifest.tsv"),
            star_manifest: root.join("star_manifest.tsv"),
            metadata: root.join("histologies.tsv"),
            output_dir: root.join("results"),
        };
        std::fs::create_dir_all(&layout.mend_dir).unwrap();
        std::fs::create_dir_all(&layout.star_dir).unwrap();

        let mut mend_manifest = String::from("file_name\tbiospecimen_id\n");
        let mut star_manifest = String::from("file_name\tbiospecimen_id\n");
        let mut metadata = String::from("Kids_First_Biospecimen_ID\tRNA_library\tsample_type\n");

        for &(id, total, unique, multi, mnd, mend, library) in SAMPLES {
            let mend_file = format!("{}.bam_umend_qc.tsv", id.to_lowercase());
            let star_file = format!("{}.Log.final.out", id.to_lowercase());
            std::fs::write(layout.mend_dir.join(&mend_file), mend_report(mnd, mend)).unwrap();
            let log = star_log(total, unique, multi);
            std::fs::write(layout.star_dir.join(&star_file), log).unwrap();
            mend_manifest.push_str(&format!("{}\t{}\n", mend_file, id));
            star_manifest.push_str(&format!("{}\t{}\n", star_file, id));
            metadata.push_str(&format!("{}\t{}\tTumor\n", id, library));
        }

        if let Some(id) = extra_star {
            let star_file = format!("{}.Log.final.out", id);
            std::fs::write(layout.star_dir.join(&star_file), star_log(10, 5, 1)).unwrap();
            star_manifest.push_str(&format!("{}\t{}\n", star_file, id));
        }

        std::fs::write(&layout.mend_manifest, mend_manifest).unwrap();
        std::fs::write(&layout.star_manifest, star_manifest).unwrap();
        std::fs::write(&layout.metadata, metadata).unwrap();
        layout
    }

    #[test]
    fn test_validate_qc_config() {
        assert!(validate_qc_config(&QcConfig::default()).is_ok());

        let invalid = QcConfig {
            sd_multiplier: 0.0,
            ..QcConfig::default()
        };
        assert!(validate_qc_config(&invalid).is_err());

        let invalid = QcConfig {
            num_threads: 0,
            ..QcConfig::default()
        };
        assert!(validate_qc_config(&invalid).is_err());
    }

    #[test]
    fn test_run_qc_flags_outlier() {
        let dir = tempdir().unwrap();
        let layout = write_fixture(dir.path(), None);
        let config = QcConfig {
            num_threads: 2,
            ..QcConfig::default()
        };

        let run = run_qc(&layout, &config).unwrap();

        assert_eq!(run.combined.len(), 11);
        assert_eq!(run.fractions.len(), 10);
        assert!(run.fractions.iter().all(|f| f.sample_id != "BS_11"));

        let outlier = run.flags.iter().find(|f| f.sample_id == "BS_10").unwrap();
        assert!(outlier.fraction_codes.contains("NM"));
        assert!(outlier.summary_flag_status.ends_with("<10M MEND"));

        let outlier_class = run
            .classifications
            .iter()
            .find(|c| c.sample_id == "BS_10")
            .unwrap();
        assert_eq!(outlier_class.depth_bin, Some(DepthBin::Under10M));
        assert!(!outlier_class.within_overall_limits());

        for (c, flag) in run.classifications.iter().zip(&run.flags) {
            assert_eq!(c.sample_id, flag.sample_id);
            let all_within = c.statuses.iter().all(|s| *s == Some(LimitStatus::WithinLimits));
            assert_eq!(c.within_overall_limits(), all_within);
        }
    }

    #[test]
    fn test_run_is_deterministic() {
        let dir = tempdir().unwrap();
        let layout = write_fixture(dir.path(), None);
        let config = QcConfig {
            num_threads: 4,
            ..QcConfig::default()
        };

        let first = run_qc(&layout, &config).unwrap();
        write_all_tables(&first, &layout.output_dir).unwrap();
        let flags_a = std::fs::read(layout.output_dir.join(FLAGS_FILE)).unwrap();
        let ranges_a = std::fs::read(layout.output_dir.join(RANGES_FILE)).unwrap();

        let second = run_qc(&layout, &config).unwrap();
        write_all_tables(&second, &layout.output_dir).unwrap();
        let flags_b = std::fs::read(layout.output_dir.join(FLAGS_FILE)).unwrap();
        let ranges_b = std::fs::read(layout.output_dir.join(RANGES_FILE)).unwrap();

        assert_eq!(flags_a, flags_b);
        assert_eq!(ranges_a, ranges_b);
    }

    #[test]
    fn test_star_only_sample_aborts_run() {
        let dir = tempdir().unwrap();
        let layout = write_fixture(dir.path(), Some("BS_99"));

        let err = run_qc(&layout, &QcConfig::default()).unwrap_err();
        match err {
            QcError::ManifestMismatch { direction, missing } => {
                assert_eq!(direction, RequiredSubset::AlignerWithinTabular);
                assert_eq!(missing, vec!["BS_99".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
