//! Utility functions for file handling and common operations

use crate::{QcError, QcResult};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Check if a file is gzip compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> QcResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(QcError::Io(e)),
    }
}

/// Open a plain or gzip-compressed text file for buffered reading
pub fn open_text<P: AsRef<Path>>(path: P) -> QcResult<Box<dyn BufRead>> {
    let file = File::open(&path)
        .map_err(|_| QcError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    let reader: Box<dyn BufRead> = if is_gzipped(&path)? {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(reader)
}

/// Get the number of CPU cores, with a fallback default
pub fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> QcResult<()> {
    if !path.as_ref().exists() {
        return Err(QcError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> QcResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| QcError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Check if a path has a specific extension
pub fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// List the regular, non-hidden files of a report directory, sorted by name
pub fn list_report_files<P: AsRef<Path>>(dir: P) -> QcResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(QcError::FileNotFound(dir.to_string_lossy().to_string()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        if !hidden {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// File name component of a path as an owned string
pub fn file_name_of<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Parse a read-count cell. Blank and `NA` cells are missing, not zero.
pub fn parse_count(raw: &str) -> Result<Option<u64>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") {
        return Ok(None);
    }

    raw.replace(',', "")
        .parse::<u64>()
        .map(Some)
        .map_err(|_| format!("invalid read count: {:?}", raw))
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting timer: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn log_elapsed(&self) {
        let duration = self.elapsed();
        log::info!("Timer '{}' elapsed: {:.2?}", self.name, duration);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_is_gzipped() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "test content").unwrap();
        assert!(!is_gzipped(temp_file.path()).unwrap());

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&[0x1f, 0x8b]).unwrap();
        assert!(is_gzipped(temp_file.path()).unwrap());
    }

    #[test]
    fn test_open_text_reads_gzip() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(temp_file.reopen().unwrap(), Compression::default());
        writeln!(encoder, "first line").unwrap();
        encoder.finish().unwrap();

        let lines: Vec<String> = open_text(temp_file.path())
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["first line".to_string()]);
    }

    #[test]
    fn test_validate_file_exists() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(validate_file_exists(temp_file.path()).is_ok());

        assert!(validate_file_exists("/nonexistent/file").is_err());
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("manifest.csv", "csv"));
        assert!(has_extension("manifest.CSV", "csv"));
        assert!(!has_extension("manifest.tsv", "csv"));
        assert!(!has_extension("manifest", "csv"));
    }

    #[test]
    fn test_list_report_files_skips_hidden_and_dirs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.Log.final.out"), "").unwrap();
        std::fs::write(dir.path().join("a.Log.final.out"), "").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let names: Vec<String> = list_report_files(dir.path())
            .unwrap()
            .iter()
            .map(file_name_of)
            .collect();
        assert_eq!(names, vec!["a.Log.final.out", "b.Log.final.out"]);

        assert!(list_report_files(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("49718112"), Ok(Some(49718112)));
        assert_eq!(parse_count(" 1,024 "), Ok(Some(1024)));
        assert_eq!(parse_count(""), Ok(None));
        assert_eq!(parse_count("NA"), Ok(None));
        assert!(parse_count("12.5%").is_err());
    }

    #[test]
    fn test_get_num_cpus() {
        assert!(get_num_cpus() >= 1);
    }
}
