//! Structural validation of the bag root.

use crate::checksum::Algorithm;
use crate::errors::{BagError, Result, StructureViolation};
use crate::fetch::FETCH_FILE;
use crate::manifest::{manifest_algorithm, MANIFEST_PREFIX, TAGMANIFEST_PREFIX};
use std::collections::BTreeSet;
use std::path::Path;

pub const DECLARATION_FILE: &str = "bagit.txt";
pub const PAYLOAD_DIR: &str = "data";

/// What may sit at the root of a particular bag.
#[derive(Debug, Clone)]
pub struct RootRules<'a> {
    pub tag_file_name: &'a str,
    /// Algorithms with a manifest file in this bag.
    pub algorithms: &'a BTreeSet<String>,
}

impl RootRules<'_> {
    /// Whether a root-level regular file is allowed.
    pub fn is_legal_file(&self, name: &str) -> bool {
        if name == DECLARATION_FILE || name == FETCH_FILE || name == self.tag_file_name {
            return true;
        }
        if let Some(alg) = manifest_algorithm(name, MANIFEST_PREFIX) {
            return self.algorithms.contains(alg);
        }
        if let Some(alg) = manifest_algorithm(name, TAGMANIFEST_PREFIX) {
            return self.algorithms.contains(alg) || Algorithm::parse(alg).is_some();
        }
        false
    }

    pub fn is_legal_dir(&self, name: &str) -> bool {
        name == PAYLOAD_DIR
    }
}

/// Check the direct children of `root` against `rules`.
///
/// The payload directory must exist. Children are checked in name order and
/// the first violation is returned.
pub fn validate_structure(root: &Path, rules: &RootRules<'_>) -> Result<()> {
    if !root.join(PAYLOAD_DIR).is_dir() {
        return Err(StructureViolation::MissingPayloadDirectory.into());
    }

    let mut children = Vec::new();
    let listing = std::fs::read_dir(root).map_err(|e| BagError::io(root, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| BagError::io(root, e))?;
        children.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    children.sort();

    for (name, path) in children {
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => return Err(StructureViolation::UnknownItem(name).into()),
        };
        if meta.is_dir() {
            if !rules.is_legal_dir(&name) {
                return Err(StructureViolation::ExtraDirectory(name).into());
            }
        } else if meta.is_file() {
            if !rules.is_legal_file(&name) {
                return Err(StructureViolation::ExtraTagFile(name).into());
            }
        } else {
            return Err(StructureViolation::UnknownItem(name).into());
        }
    }
    Ok(())
}
