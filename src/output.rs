//! Tab-delimited output tables

use crate::{
    classify::{count_statuses, DepthBin, LimitStatus},
    fractions::FractionSet,
    join::CombinedSample,
    pipeline::QcRun,
    reference::ReferenceRanges,
    QcResult,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub const COMBINED_METRICS_FILE: &str = "combined_metrics.tsv";
pub const FRACTIONS_FILE: &str = "sample_fractions.tsv";
pub const FLAGS_FILE: &str = "qc_flags.tsv";
pub const RANGES_FILE: &str = "reference_ranges.tsv";
pub const STATUS_COUNTS_FILE: &str = "limit_status_counts.tsv";

const COMBINED_METRICS_HEADER: [&str; 7] = [
    "sample_id",
    "total_reads",
    "unique_reads",
    "multimapped_reads",
    "mapped_reads",
    "mnd",
    "mend",
];

const FRACTIONS_HEADER: [&str; 6] = [
    "sample_id",
    "frac_unmapped_of_total",
    "frac_multimapped_of_mapped",
    "frac_dupe_of_mapped",
    "frac_nonexonic_of_nondupe",
    "mend",
];

const FLAGS_HEADER: [&str; 8] = [
    "sample_id",
    "frac_unmapped_of_total",
    "frac_multimapped_of_mapped",
    "frac_dupe_of_mapped",
    "frac_nonexonic_of_nondupe",
    "mend_depth_bin",
    "within_overall_limits",
    "summary_flag_status",
];

const RANGES_HEADER: [&str; 8] = [
    "fraction",
    "n",
    "mean",
    "sd",
    "minus_1sd",
    "plus_1sd",
    "minus_2sd",
    "plus_2sd",
];

const STATUS_COUNTS_HEADER: [&str; 5] = [
    "fraction",
    "below_limit",
    "within_limits",
    "above_limit",
    "unclassified",
];

/// Destination of a table: a plain file, or a gzip stream when the path
/// ends in `.gz`
pub enum TsvSink {
    Plain(File),
    Gzip(GzEncoder<File>),
}

impl TsvSink {
    pub fn create(path: &Path) -> QcResult<Self> {
        let file = File::create(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("gz") {
            Ok(TsvSink::Gzip(GzEncoder::new(file, Compression::default())))
        } else {
            Ok(TsvSink::Plain(file))
        }
    }

    /// Flush the file, writing the gzip trailer first when compressed
    pub fn finish(self) -> io::Result<()> {
        match self {
            TsvSink::Plain(mut file) => file.flush(),
            TsvSink::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for TsvSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TsvSink::Plain(file) => file.write(buf),
            TsvSink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TsvSink::Plain(file) => file.flush(),
            TsvSink::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Open a TSV writer. Headers are not derived from the rows; callers write
/// them so that an empty table still has its header line.
pub fn tsv_writer(path: &Path) -> QcResult<csv::Writer<TsvSink>> {
    let sink = TsvSink::create(path)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(sink))
}

fn write_rows<T: Serialize>(
    header: &[&str],
    rows: impl IntoIterator<Item = T>,
    path: &Path,
) -> QcResult<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }

    let sink = writer.into_inner().map_err(|e| e.into_error())?;
    sink.finish()?;
    Ok(())
}

pub fn write_combined_metrics(samples: &[CombinedSample], path: &Path) -> QcResult<()> {
    write_rows(&COMBINED_METRICS_HEADER, samples, path)
}

pub fn write_fractions(fractions: &[FractionSet], path: &Path) -> QcResult<()> {
    write_rows(&FRACTIONS_HEADER, fractions, path)
}

#[derive(Debug, Serialize)]
struct FlagRow<'a> {
    sample_id: &'a str,
    frac_unmapped_of_total: Option<LimitStatus>,
    frac_multimapped_of_mapped: Option<LimitStatus>,
    frac_dupe_of_mapped: Option<LimitStatus>,
    frac_nonexonic_of_nondupe: Option<LimitStatus>,
    mend_depth_bin: Option<DepthBin>,
    within_overall_limits: bool,
    summary_flag_status: &'a str,
}

/// Per-sample flag table; unclassified statuses are left blank
pub fn write_flags(run: &QcRun, path: &Path) -> QcResult<()> {
    let rows = run
        .classifications
        .iter()
        .zip(&run.flags)
        .map(|(c, flag)| FlagRow {
            sample_id: &c.sample_id,
            frac_unmapped_of_total: c.statuses[0],
            frac_multimapped_of_mapped: c.statuses[1],
            frac_dupe_of_mapped: c.statuses[2],
            frac_nonexonic_of_nondupe: c.statuses[3],
            mend_depth_bin: c.depth_bin,
            within_overall_limits: c.within_overall_limits(),
            summary_flag_status: &flag.summary_flag_status,
        });

    write_rows(&FLAGS_HEADER, rows, path)
}

#[derive(Debug, Serialize)]
struct RangeRow {
    fraction: &'static str,
    n: Option<usize>,
    mean: Option<f64>,
    sd: Option<f64>,
    minus_1sd: Option<f64>,
    plus_1sd: Option<f64>,
    minus_2sd: Option<f64>,
    plus_2sd: Option<f64>,
}

/// Summary statistics per fraction; undefined ranges are written blank
pub fn write_reference_ranges(ranges: &ReferenceRanges, path: &Path) -> QcResult<()> {
    let rows = ranges.iter().map(|(fraction, range)| RangeRow {
        fraction: fraction.name(),
        n: range.map(|r| r.n),
        mean: range.map(|r| r.mean),
        sd: range.map(|r| r.sd),
        minus_1sd: range.map(|r| r.bound(-1.0)),
        plus_1sd: range.map(|r| r.bound(1.0)),
        minus_2sd: range.map(|r| r.bound(-2.0)),
        plus_2sd: range.map(|r| r.bound(2.0)),
    });

    write_rows(&RANGES_HEADER, rows, path)
}

#[derive(Debug, Serialize)]
struct CountRow {
    fraction: &'static str,
    below_limit: usize,
    within_limits: usize,
    above_limit: usize,
    unclassified: usize,
}

pub fn write_status_counts(run: &QcRun, path: &Path) -> QcResult<()> {
    let rows = count_statuses(&run.classifications)
        .into_iter()
        .map(|(fraction, counts)| CountRow {
            fraction: fraction.name(),
            below_limit: counts.below_limit,
            within_limits: counts.within_limits,
            above_limit: counts.above_limit,
            unclassified: counts.unclassified,
        });

    write_rows(&STATUS_COUNTS_HEADER, rows, path)
}

/// Write every table of a run into `output_dir`
pub fn write_all_tables(run: &QcRun, output_dir: &Path) -> QcResult<()> {
    std::fs::create_dir_all(output_dir)?;

    write_combined_metrics(&run.combined, &output_dir.join(COMBINED_METRICS_FILE))?;
    write_fractions(&run.fractions, &output_dir.join(FRACTIONS_FILE))?;
    write_flags(run, &output_dir.join(FLAGS_FILE))?;
    write_reference_ranges(&run.ranges, &output_dir.join(RANGES_FILE))?;
    write_status_counts(run, &output_dir.join(STATUS_COUNTS_FILE))?;

    log::info!("Wrote QC tables to {:?}", output_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SampleClassification;
    use crate::flags::flag_sample;
    use crate::fractions::Fraction;
    use crate::reference::ReferenceRange;
    use crate::utils::open_text;
    use std::io::BufRead;
    use tempfile::tempdir;

    fn run_with(classifications: Vec<SampleClassification>) -> QcRun {
        let flags = classifications.iter().map(flag_sample).collect();
        QcRun {
            combined: Vec::new(),
            fractions: Vec::new(),
            ranges: ReferenceRanges::estimate(&[], 2.0),
            classifications,
            flags,
        }
    }

    #[test]
    fn test_combined_metrics_blank_for_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMBINED_METRICS_FILE);
        let samples = vec![CombinedSample {
            sample_id: "BS_A".to_string(),
            total_reads: Some(100),
            mnd: Some(80),
            ..Default::default()
        }];

        write_combined_metrics(&samples, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "sample_id\ttotal_reads\tunique_reads\tmultimapped_reads\tmapped_reads\tmnd\tmend"
        );
        assert_eq!(lines[1], "BS_A\t100\t\t\t\t80\t");
    }

    #[test]
    fn test_reference_ranges_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RANGES_FILE);
        let sets: Vec<FractionSet> = [0.25, 0.5, 0.75]
            .iter()
            .map(|&v| FractionSet {
                sample_id: format!("BS_{}", v),
                frac_unmapped_of_total: Some(v),
                frac_multimapped_of_mapped: None,
                frac_dupe_of_mapped: None,
                frac_nonexonic_of_nondupe: None,
                mend: None,
            })
            .collect();
        let ranges = ReferenceRanges::estimate(&sets, 2.0);

        write_reference_ranges(&ranges, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "fraction\tn\tmean\tsd\tminus_1sd\tplus_1sd\tminus_2sd\tplus_2sd");
        assert_eq!(lines[1], "frac_unmapped_of_total\t3\t0.5\t0.25\t0.25\t0.75\t0.0\t1.0");
        assert_eq!(lines[2], "frac_multimapped_of_mapped\t\t\t\t\t\t\t");

        let unmapped: &ReferenceRange = ranges.get(Fraction::UnmappedOfTotal).unwrap();
        assert_eq!(unmapped.lower, unmapped.bound(-2.0));
    }

    #[test]
    fn test_flags_table_leaves_unclassified_blank() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FLAGS_FILE);
        let run = run_with(vec![SampleClassification {
            sample_id: "BS_A".to_string(),
            statuses: [
                None,
                Some(LimitStatus::WithinLimits),
                Some(LimitStatus::AboveLimit),
                None,
            ],
            depth_bin: Some(DepthBin::From10To20M),
        }]);

        write_flags(&run, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], FLAGS_HEADER.join("\t"));
        assert_eq!(lines[1], "BS_A\t\twithin_limits\tabove_limit\t\t10-20M\tfalse\tD, 10-20M MEND");
    }

    #[test]
    fn test_empty_batch_keeps_headers() {
        let dir = tempdir().unwrap();
        write_all_tables(&run_with(Vec::new()), dir.path()).unwrap();

        let flags = std::fs::read_to_string(dir.path().join(FLAGS_FILE)).unwrap();
        assert_eq!(flags.lines().collect::<Vec<_>>(), vec![FLAGS_HEADER.join("\t")]);

        let fractions = std::fs::read_to_string(dir.path().join(FRACTIONS_FILE)).unwrap();
        assert_eq!(fractions.lines().collect::<Vec<_>>(), vec![FRACTIONS_HEADER.join("\t")]);

        let counts = std::fs::read_to_string(dir.path().join(STATUS_COUNTS_FILE)).unwrap();
        assert_eq!(counts.lines().count(), 5);
        assert!(counts.contains("frac_dupe_of_mapped\t0\t0\t0\t0"));
    }

    #[test]
    fn test_gzip_output_is_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("combined_metrics.tsv.gz");
        let samples = vec![CombinedSample {
            sample_id: "BS_A".to_string(),
            mend: Some(70),
            ..Default::default()
        }];

        write_combined_metrics(&samples, &path).unwrap();

        let lines: Vec<String> = open_text(&path)
            .unwrap()
            .lines()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], COMBINED_METRICS_HEADER.join("\t"));
        assert_eq!(lines[1], "BS_A\t\t\t\t\t\t70");
    }
}
