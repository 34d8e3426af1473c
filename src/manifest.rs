//! Manifest and sample metadata readers

use crate::{
    utils::{has_extension, open_text},
    QcError, QcResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const FILE_NAME_COLUMNS: &[&str] = &["file_name", "name"];
const BIOSPECIMEN_COLUMNS: &[&str] = &["biospecimen_id", "kids_first_biospecimen_id", "sample_id"];
const LIBRARY_COLUMNS: &[&str] = &["rna_library", "library"];
const SAMPLE_TYPE_COLUMNS: &[&str] = &["sample_type"];

/// Library preparation and sample type for one biospecimen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub biospecimen_id: String,
    pub rna_library: Option<String>,
    pub sample_type: Option<String>,
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim();
        aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
    })
}

fn require_column(
    headers: &csv::StringRecord,
    aliases: &[&str],
    path: &Path,
) -> QcResult<usize> {
    find_column(headers, aliases).ok_or_else(|| {
        QcError::InvalidManifest(format!(
            "{}: none of the columns {:?} found in header",
            path.display(),
            aliases
        ))
    })
}

fn table_reader(path: &Path) -> QcResult<csv::Reader<Box<dyn std::io::BufRead>>> {
    let delimiter = if has_extension(path, "csv") { b',' } else { b'\t' };

    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(open_text(path)?))
}

fn cell(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("na"))
        .map(str::to_string)
}

/// Read a manifest mapping report file names to biospecimen IDs.
///
/// A file name listed twice must resolve to the same ID.
pub fn read_manifest<P: AsRef<Path>>(path: P) -> QcResult<BTreeMap<String, String>> {
    let path = path.as_ref();
    let mut reader = table_reader(path)?;
    let headers = reader.headers()?.clone();

    let file_col = require_column(&headers, FILE_NAME_COLUMNS, path)?;
    let id_col = require_column(&headers, BIOSPECIMEN_COLUMNS, path)?;

    let mut manifest = BTreeMap::new();
    for result in reader.records() {
        let record = result?;
        let (Some(file_name), Some(id)) = (cell(&record, file_col), cell(&record, id_col)) else {
            log::debug!("{}: skipping manifest row without file name or ID", path.display());
            continue;
        };

        if let Some(previous) = manifest.get(&file_name) {
            if previous != &id {
                return Err(QcError::InvalidManifest(format!(
                    "{}: {} is assigned to both {} and {}",
                    path.display(),
                    file_name,
                    previous,
                    id
                )));
            }
            continue;
        }
        manifest.insert(file_name, id);
    }

    log::info!("Read {} manifest entries from {}", manifest.len(), path.display());
    Ok(manifest)
}

/// Read the sample metadata table keyed by biospecimen ID
pub fn read_metadata<P: AsRef<Path>>(path: P) -> QcResult<BTreeMap<String, SampleMetadata>> {
    let path = path.as_ref();
    let mut reader = table_reader(path)?;
    let headers = reader.headers()?.clone();

    let id_col = require_column(&headers, BIOSPECIMEN_COLUMNS, path)?;
    let library_col = require_column(&headers, LIBRARY_COLUMNS, path)?;
    let type_col = find_column(&headers, SAMPLE_TYPE_COLUMNS);

    let mut metadata = BTreeMap::new();
    for result in reader.records() {
        let record = result?;
        let Some(biospecimen_id) = cell(&record, id_col) else {
            continue;
        };

        let entry = SampleMetadata {
            biospecimen_id: biospecimen_id.clone(),
            rna_library: cell(&record, library_col),
            sample_type: type_col.and_then(|c| cell(&record, c)),
        };
        metadata.insert(biospecimen_id, entry);
    }

    log::info!("Read metadata for {} biospecimens from {}", metadata.len(), path.display());
    Ok(metadata)
}
