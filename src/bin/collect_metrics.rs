//! CLI binary that only parses and joins reports into the combined metrics table

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use rnaseq_qc::{
    output::write_combined_metrics,
    pipeline::{collect_metrics, validate_qc_config},
    utils::get_num_cpus,
    InputLayout, QcConfig, RequiredSubset,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "collect_metrics")]
#[command(about = "Join MEND QC reports and STAR logs into one read count table per biospecimen")]
struct Args {
    /// Directory of MEND QC reports
    #[arg(long, value_name = "DIR", default_value = "data/mend_qc")]
    mend_dir: PathBuf,

    /// Directory of STAR Log.final.out files
    #[arg(long, value_name = "DIR", default_value = "data/star_logs")]
    star_dir: PathBuf,

    /// Manifest mapping MEND report file names to biospecimen IDs
    #[arg(long, value_name = "FILE", default_value = "data/mend_manifest.tsv")]
    mend_manifest: PathBuf,

    /// Manifest mapping STAR log file names to biospecimen IDs
    #[arg(long, value_name = "FILE", default_value = "data/star_manifest.tsv")]
    star_manifest: PathBuf,

    /// Path to the output TSV file
    #[arg(long, value_name = "FILE", default_value = "results/combined_metrics.tsv")]
    output: PathBuf,

    /// Require every MEND sample to have a STAR log instead of the reverse
    #[arg(long)]
    require_star_for_mend: bool,

    /// Number of threads used to parse reports
    #[arg(long, default_value_t = get_num_cpus())]
    num_threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let layout = InputLayout {
        mend_dir: args.mend_dir,
        star_dir: args.star_dir,
        mend_manifest: args.mend_manifest,
        star_manifest: args.star_manifest,
        ..InputLayout::default()
    };
    let config = QcConfig {
        required_subset: if args.require_star_for_mend {
            RequiredSubset::TabularWithinAligner
        } else {
            RequiredSubset::AlignerWithinTabular
        },
        num_threads: args.num_threads,
        ..QcConfig::default()
    };
    validate_qc_config(&config)?;

    let combined = collect_metrics(&layout, &config).context("failed to collect read counts")?;
    log::info!("Collected read counts for {} biospecimens", combined.len());

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create output directory {:?}", parent))?;
    }
    write_combined_metrics(&combined, &args.output)
        .with_context(|| format!("cannot write {:?}", args.output))?;

    println!("Wrote {} samples to {}", combined.len(), args.output.display());
    Ok(())
}
