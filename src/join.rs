//! Resolve report file names to biospecimen IDs and merge the two report tables

use crate::{
    reports::{MendReport, StarReport},
    QcError, QcResult, RequiredSubset,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// All read counts known for one biospecimen after the join
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedSample {
    pub sample_id: String,
    pub total_reads: Option<u64>,
    pub unique_reads: Option<u64>,
    pub multimapped_reads: Option<u64>,
    pub mapped_reads: Option<u64>,
    pub mnd: Option<u64>,
    pub mend: Option<u64>,
}

/// Key every row by the biospecimen ID its file name resolves to.
///
/// Rows whose file is absent from the manifest are dropped with a warning;
/// two files resolving to one ID is a manifest error.
pub fn resolve_ids<T, F>(
    rows: Vec<T>,
    manifest: &BTreeMap<String, String>,
    source: &str,
    file_name: F,
) -> QcResult<BTreeMap<String, T>>
where
    F: Fn(&T) -> &str,
{
    let mut resolved = BTreeMap::new();

    for row in rows {
        let name = file_name(&row).to_string();
        let Some(id) = manifest.get(&name) else {
            log::warn!("{} report {} has no manifest entry, skipping", source, name);
            continue;
        };

        if resolved.insert(id.clone(), row).is_some() {
            return Err(QcError::InvalidManifest(format!(
                "more than one {} report resolves to {}",
                source, id
            )));
        }
    }

    Ok(resolved)
}

/// Fail unless the IDs of the required side are all present on the other side
pub fn check_required_subset(
    mend_ids: &BTreeSet<&String>,
    star_ids: &BTreeSet<&String>,
    direction: RequiredSubset,
) -> QcResult<()> {
    let (inner, outer) = match direction {
        RequiredSubset::AlignerWithinTabular => (star_ids, mend_ids),
        RequiredSubset::TabularWithinAligner => (mend_ids, star_ids),
    };

    let missing: Vec<String> = inner.difference(outer).map(|id| id.to_string()).collect();
    if !missing.is_empty() {
        return Err(QcError::ManifestMismatch { direction, missing });
    }

    Ok(())
}

/// Full outer join of MEND and STAR rows on biospecimen ID, sorted by ID
pub fn join_reports(
    mend: Vec<MendReport>,
    star: Vec<StarReport>,
    mend_manifest: &BTreeMap<String, String>,
    star_manifest: &BTreeMap<String, String>,
    direction: RequiredSubset,
) -> QcResult<Vec<CombinedSample>> {
    let mend = resolve_ids(mend, mend_manifest, "MEND", |r| r.file_name.as_str())?;
    let star = resolve_ids(star, star_manifest, "STAR", |r| r.file_name.as_str())?;

    let mend_ids: BTreeSet<&String> = mend.keys().collect();
    let star_ids: BTreeSet<&String> = star.keys().collect();
    check_required_subset(&mend_ids, &star_ids, direction)?;

    let all_ids: BTreeSet<&String> = mend_ids.union(&star_ids).copied().collect();
    let combined: Vec<CombinedSample> = all_ids
        .into_iter()
        .map(|id| {
            let mut sample = CombinedSample {
                sample_id: id.clone(),
                ..Default::default()
            };
            if let Some(m) = mend.get(id) {
                sample.mnd = m.mnd;
                sample.mend = m.mend;
            }
            if let Some(s) = star.get(id) {
                sample.total_reads = s.total_reads;
                sample.unique_reads = s.unique_reads;
                sample.multimapped_reads = s.multimapped_reads;
            }
            sample.mapped_reads = match (sample.multimapped_reads, sample.unique_reads) {
                (Some(multi), Some(unique)) => multi.checked_add(unique),
                _ => None,
            };
            if sample.mapped_reads.is_none()
                && sample.multimapped_reads.is_some()
                && sample.unique_reads.is_some()
            {
                log::warn!("{}: mapped read count overflows, treating as missing", id);
            }
            sample
        })
        .collect();

    log::info!(
        "Joined {} MEND and {} STAR samples into {} rows",
        mend.len(),
        star.len(),
        combined.len()
    );
    Ok(combined)
}
