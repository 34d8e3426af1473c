//! Parsers for per-sample MEND QC reports and STAR aligner logs

use crate::{
    utils::{file_name_of, list_report_files, open_text, parse_count},
    QcError, QcResult,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// One row of a tabular MEND QC report, keyed by the report's file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MendReport {
    pub file_name: String,
    pub mnd: Option<u64>,
    pub mend: Option<u64>,
}

/// Read counts pulled from one STAR `Log.final.out`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarReport {
    pub file_name: String,
    pub total_reads: Option<u64>,
    pub unique_reads: Option<u64>,
    pub multimapped_reads: Option<u64>,
}

impl StarReport {
    fn empty(file_name: String) -> Self {
        Self {
            file_name,
            total_reads: None,
            unique_reads: None,
            multimapped_reads: None,
        }
    }

    /// True when none of the tracked keys were present in the log
    pub fn is_empty(&self) -> bool {
        self.total_reads.is_none()
            && self.unique_reads.is_none()
            && self.multimapped_reads.is_none()
    }
}

/// STAR log keys that are kept, in the order of the `StarReport` fields
pub const STAR_KEYS: [&str; 3] = [
    "Number of input reads",
    "Uniquely mapped reads number",
    "Number of reads mapped to multiple loci",
];

/// Read one MEND QC report.
///
/// The table has a header row followed by `input`, MND, MEND and `qc`
/// columns; the input and qc columns are ignored. A report describes one
/// sample, so more than one data row is an error.
pub fn read_mend_report<P: AsRef<Path>>(path: P) -> QcResult<Vec<MendReport>> {
    let file_name = file_name_of(&path);
    let reader = open_text(&path)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;

        if record.len() < 3 {
            log::debug!("{}: skipping short row with {} columns", file_name, record.len());
            continue;
        }

        let mnd = parse_count(&record[1])
            .map_err(|e| QcError::InvalidReport(format!("{}: MND {}", file_name, e)))?;
        let mend = parse_count(&record[2])
            .map_err(|e| QcError::InvalidReport(format!("{}: MEND {}", file_name, e)))?;

        if !rows.is_empty() {
            return Err(QcError::InvalidReport(format!(
                "{}: more than one data row",
                file_name
            )));
        }

        rows.push(MendReport {
            file_name: file_name.clone(),
            mnd,
            mend,
        });
    }

    Ok(rows)
}

/// Parse the body of a STAR `Log.final.out`. Lines that do not carry one of
/// the tracked keys are dropped.
pub fn parse_star_log<R: BufRead>(file_name: &str, reader: R) -> QcResult<StarReport> {
    let mut report = StarReport::empty(file_name.to_string());

    for line in reader.lines() {
        let line = line?;
        let Some((key, value)) = line.split_once('|') else {
            continue;
        };

        let Some(slot) = STAR_KEYS.iter().position(|k| key.contains(k)) else {
            continue;
        };

        let count = match parse_count(value) {
            Ok(count) => count,
            Err(e) => {
                log::warn!("{}: {} for {:?}", file_name, e, STAR_KEYS[slot]);
                None
            }
        };

        match slot {
            0 => report.total_reads = count,
            1 => report.unique_reads = count,
            _ => report.multimapped_reads = count,
        }
    }

    Ok(report)
}

/// Read one STAR log file from disk
pub fn read_star_log<P: AsRef<Path>>(path: P) -> QcResult<StarReport> {
    let file_name = file_name_of(&path);
    parse_star_log(&file_name, open_text(&path)?)
}

fn parse_in_pool<T, F>(files: Vec<PathBuf>, num_threads: usize, parse: F) -> QcResult<Vec<T>>
where
    T: Send,
    F: Fn(&Path) -> QcResult<T> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| QcError::InvalidConfig(format!("cannot start parser threads: {}", e)))?;

    pool.install(|| files.par_iter().map(|path| parse(path.as_path())).collect())
}

/// Parse every MEND QC report in a directory into one table, sorted by file name
pub fn collect_mend_reports<P: AsRef<Path>>(
    dir: P,
    num_threads: usize,
) -> QcResult<Vec<MendReport>> {
    let files = list_report_files(&dir)?;
    log::info!("Found {} MEND QC reports in {:?}", files.len(), dir.as_ref());

    let mut rows: Vec<MendReport> = parse_in_pool(files, num_threads, |p| read_mend_report(p))?
        .into_iter()
        .flatten()
        .collect();

    rows.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(rows)
}

/// Parse every STAR log in a directory into one row per file, sorted by file name
pub fn collect_star_logs<P: AsRef<Path>>(dir: P, num_threads: usize) -> QcResult<Vec<StarReport>> {
    let files = list_report_files(&dir)?;
    log::info!("Found {} STAR logs in {:?}", files.len(), dir.as_ref());

    let mut rows = parse_in_pool(files, num_threads, |p| read_star_log(p))?;

    for row in rows.iter().filter(|r| r.is_empty()) {
        log::warn!("{}: no read counts found, all values will be missing", row.file_name);
    }

    rows.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(rows)
}
