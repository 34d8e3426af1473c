//! CLI binary for the full QC batch: reports + manifests + metadata → flag tables

use clap::Parser;
use env_logger::Env;
use rnaseq_qc::{
    output::{write_all_tables, FLAGS_FILE},
    pipeline::run_qc,
    utils::{get_num_cpus, Timer},
    InputLayout, QcConfig, QcError, QcResult, RequiredSubset,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rnaseq_qc")]
#[command(about = "RNA-seq read composition QC: reference ranges and per-sample flags")]
#[command(long_about = "
rnaseq_qc reads MEND QC reports and STAR Log.final.out files, resolves them to
biospecimen IDs through two manifests, and flags every sample of the selected
library protocol against reference ranges computed from the batch itself.

Four fractions are checked against mean ± 2 SD of the batch:
- NM: unmapped of total reads
- MM: multimapped of mapped reads
- D:  duplicates of mapped reads
- NE: non-exonic of non-duplicate reads

MEND depth is binned separately at 10M and 20M reads.

Every path defaults to the standard batch layout relative to the working
directory, so a bare `rnaseq_qc` runs the batch in place.
")]
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

    /// Sample metadata with RNA library and sample type
    #[arg(long, value_name = "FILE", default_value = "data/histologies.tsv")]
    metadata: PathBuf,

    /// Output directory for the QC tables
    #[arg(long, value_name = "DIR", default_value = "results")]
    output_dir: PathBuf,

    /// RNA library protocol to analyse
    #[arg(long, default_value = "stranded")]
    rna_library: String,

    /// Only analyse samples of this sample type
    #[arg(long)]
    sample_type: Option<String>,

    /// Require every MEND sample to have a STAR log instead of the reverse
    #[arg(long)]
    require_star_for_mend: bool,

    /// Number of threads used to parse reports
    #[arg(long, default_value_t = get_num_cpus())]
    num_threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of existing output tables
    #[arg(short, long)]
    force: bool,
}

fn run() -> QcResult<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let layout = InputLayout {
        mend_dir: args.mend_dir,
        star_dir: args.star_dir,
        mend_manifest: args.mend_manifest,
        star_manifest: args.star_manifest,
        metadata: args.metadata,
        output_dir: args.output_dir,
    };

    let config = QcConfig {
        rna_library: args.rna_library,
        sample_type: args.sample_type,
        required_subset: if args.require_star_for_mend {
            RequiredSubset::TabularWithinAligner
        } else {
            RequiredSubset::AlignerWithinTabular
        },
        num_threads: args.num_threads,
        ..QcConfig::default()
    };

    log::info!("Starting RNA-seq QC batch");
    log::info!("MEND reports: {:?}", layout.mend_dir);
    log::info!("STAR logs: {:?}", layout.star_dir);
    log::info!("Output directory: {:?}", layout.output_dir);
    log::info!(
        "Configuration: library={}, sample_type={:?}, subset check: {}",
        config.rna_library,
        config.sample_type,
        config.required_subset
    );

    let flags_path = layout.output_dir.join(FLAGS_FILE);
    if flags_path.exists() && !args.force {
        return Err(QcError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("Output file {:?} already exists. Use --force to overwrite.", flags_path),
        )));
    }

    let run = run_qc(&layout, &config)?;

    if run.fractions.is_empty() {
        log::warn!(
            "No samples matched library {:?}; flag tables will be empty",
            config.rna_library
        );
    }

    let _timer = Timer::new("Writing QC tables");
    write_all_tables(&run, &layout.output_dir)?;

    log::info!("QC batch completed successfully");
    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: QcError) -> ! {
    match error {
        QcError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the input layout exists and is readable.");
        }
        QcError::InvalidReport(msg) => {
            eprintln!("Error: Invalid report: {}", msg);
            eprintln!("Please check the MEND QC report and STAR log formats.");
        }
        QcError::InvalidManifest(msg) => {
            eprintln!("Error: Invalid manifest: {}", msg);
            eprintln!("Please check the manifest and metadata columns.");
        }
        QcError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
        }
        QcError::ManifestMismatch { direction, missing } => {
            eprintln!("Error: Manifest integrity check failed: {}", direction);
            eprintln!("Samples without a match ({}): {}", missing.len(), missing.join(", "));
            eprintln!("No output was written. Correct the manifests and rerun.");
        }
        QcError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        QcError::Csv(ref e) => {
            eprintln!("Error: Table processing error: {}", e);
            eprintln!("Please check that input tables are tab-delimited with a header row.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
