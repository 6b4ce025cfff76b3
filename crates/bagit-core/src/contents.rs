//! Content validation: payload Oxum and manifest digests.

use crate::checksum::{digest_file, hash_files, Algorithm, ContentSource, FileDigest, HashJob};
use crate::errors::{BagError, Mismatch, Result, StructureViolation};
use crate::manifest::{Manifest, Oxum};
use crate::structure::PAYLOAD_DIR;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

fn walk_error(payload: &Path, e: walkdir::Error) -> BagError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| payload.to_path_buf());
    BagError::io(path, e.into())
}

/// Regular files under the payload directory as sorted, `/`-separated paths
/// relative to `root` (`data/...`). Names that are not UTF-8 are listed
/// lossily; no manifest can declare them.
pub fn payload_files(root: &Path) -> Result<Vec<String>> {
    let payload = root.join(PAYLOAD_DIR);
    let mut files = Vec::new();
    for entry in WalkDir::new(&payload).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(&payload, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(rel);
    }
    files.sort();
    Ok(files)
}

/// Total bytes and file count of the payload on disk.
pub fn measure_payload(root: &Path) -> Result<Oxum> {
    let payload = root.join(PAYLOAD_DIR);
    let mut oxum = Oxum::default();
    for entry in WalkDir::new(&payload).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(&payload, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry.metadata().map_err(|e| walk_error(&payload, e))?;
        oxum.bytes += meta.len();
        oxum.files += 1;
    }
    Ok(oxum)
}

/// Compare a declared `Payload-Oxum` value with the payload on disk.
pub fn validate_oxum(root: &Path, declared: &str) -> Result<()> {
    let expected: Oxum = declared.parse()?;
    let found = measure_payload(root)?;
    if found != expected {
        return Err(StructureViolation::OxumMismatch { expected, found }.into());
    }
    Ok(())
}

/// One hash job per manifest entry, restricted to locally computable algorithms.
///
/// Fails when none of the recorded algorithms can be computed here.
pub fn plan_hash_check(manifest: &Manifest) -> Result<Vec<HashJob>> {
    let recorded: BTreeSet<&str> = manifest
        .algorithms
        .iter()
        .map(String::as_str)
        .chain(
            manifest
                .entries
                .values()
                .flat_map(|digests| digests.keys().map(String::as_str)),
        )
        .collect();

    let mut usable = BTreeSet::new();
    for name in &recorded {
        match Algorithm::parse(name) {
            Some(alg) => {
                usable.insert(alg);
            }
            None => warn!(
                algorithm = *name,
                "unable to validate file contents using unknown hash algorithm"
            ),
        }
    }
    if usable.is_empty() {
        return Err(BagError::UnsupportedAlgorithm(format!(
            "unable to validate bag contents: none of the hash algorithms in {:?} are supported",
            manifest.algorithms
        )));
    }

    Ok(manifest
        .entries
        .iter()
        .filter_map(|(path, digests)| {
            let algorithms: Vec<Algorithm> = digests
                .keys()
                .filter_map(|name| Algorithm::parse(name))
                .collect();
            (!algorithms.is_empty()).then(|| HashJob {
                path: path.clone(),
                algorithms,
            })
        })
        .collect())
}

/// Check recomputed digests against the manifest, collecting every mismatch.
pub fn compare_digests(manifest: &Manifest, results: &[FileDigest]) -> Result<()> {
    let mut mismatches = Vec::new();
    for result in results {
        let Some(stored) = manifest.entries.get(&result.path) else {
            continue;
        };
        for (alg, computed) in &result.digests {
            let Some(expected) = stored.get(alg) else {
                continue;
            };
            if !expected.eq_ignore_ascii_case(computed) {
                warn!(
                    path = %result.path,
                    algorithm = %alg,
                    "stored hash {} doesn't match calculated hash {}",
                    expected,
                    computed
                );
                mismatches.push(Mismatch {
                    path: result.path.clone(),
                    algorithm: alg.clone(),
                    expected: expected.clone(),
                    computed: computed.clone(),
                });
            }
        }
    }
    if mismatches.is_empty() {
        return Ok(());
    }
    mismatches.sort_by(|a, b| (&a.path, &a.algorithm).cmp(&(&b.path, &b.algorithm)));
    Err(BagError::ChecksumMismatch(mismatches))
}

/// Recompute every entry's digests one file at a time.
pub fn validate_entries(source: &dyn ContentSource, manifest: &Manifest) -> Result<()> {
    let jobs = plan_hash_check(manifest)?;
    info!(files = jobs.len(), "validating payload digests");
    let mut results = Vec::with_capacity(jobs.len());
    for job in &jobs {
        results.push(digest_file(source, &job.path, &job.algorithms)?);
    }
    compare_digests(manifest, &results)
}

/// Like [`validate_entries`], with up to `processes` files hashed at once.
pub async fn validate_entries_parallel(
    source: Arc<dyn ContentSource>,
    manifest: &Manifest,
    processes: usize,
) -> Result<()> {
    let jobs = plan_hash_check(manifest)?;
    info!(files = jobs.len(), processes, "validating payload digests");
    let results = hash_files(source, jobs, processes).await?;
    compare_digests(manifest, &results)
}

/// Paths declared in the manifest but absent on disk, and paths on disk that
/// the manifest does not declare.
pub fn compare_manifest_with_fs(
    manifest: &Manifest,
    payload: &[String],
) -> (Vec<String>, Vec<String>) {
    let declared = manifest.paths();
    let present: BTreeSet<String> = payload.iter().cloned().collect();
    (
        declared.difference(&present).cloned().collect(),
        present.difference(&declared).cloned().collect(),
    )
}
