//! The bag aggregate: declaration tags, descriptive tags and manifests of
//! one bag directory, plus the validation entry points.

use crate::checksum::{ContentSource, LocalSource};
use crate::config::{BagVersion, ValidateOptions};
use crate::contents::{
    compare_manifest_with_fs, payload_files, validate_entries, validate_entries_parallel,
    validate_oxum,
};
use crate::errors::{BagError, Result};
use crate::fetch::{load_fetch_file, FetchEntry};
use crate::manifest::{discover_manifests, Manifest, MANIFEST_PREFIX, TAGMANIFEST_PREFIX};
use crate::structure::{validate_structure, RootRules, DECLARATION_FILE};
use crate::tags::{load_tag_file, Tags};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const VERSION_TAG: &str = "BagIt-Version";
pub const ENCODING_TAG: &str = "Tag-File-Character-Encoding";
pub const OXUM_TAG: &str = "Payload-Oxum";
pub const BAGGING_DATE_TAG: &str = "Bagging-Date";

/// A bag opened from disk. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct Bag {
    path: PathBuf,
    version: BagVersion,
    encoding: String,
    tags: Tags,
    info: Tags,
    manifest: Manifest,
    source: Arc<dyn ContentSource>,
}

impl fmt::Display for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bag(path=\"{}\")", self.path.display())
    }
}

impl Bag {
    /// Load the declaration, descriptive tags and manifests of the bag at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::open_with(path, Arc::new(LocalSource::new(path)))
    }

    /// Like [`Bag::open`], reading tag, manifest and payload content through
    /// `source`. The root listing and payload walk still use `path`.
    pub fn open_with(path: impl AsRef<Path>, source: Arc<dyn ContentSource>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(BagError::Configuration(format!(
                "no such bag directory: {}",
                path.display()
            )));
        }

        if !source.is_file(DECLARATION_FILE) {
            return Err(BagError::Format(format!(
                "no {} found: {}",
                DECLARATION_FILE,
                source.describe(DECLARATION_FILE).display()
            )));
        }
        let tags = load_tag_file(source.as_ref(), DECLARATION_FILE)?;
        let required = |name: &str| {
            tags.get(name).map(str::to_string).ok_or_else(|| {
                BagError::Format(format!(
                    "missing required tag in {}: {}",
                    DECLARATION_FILE, name
                ))
            })
        };
        let version: BagVersion = required(VERSION_TAG)?.parse()?;
        let encoding = required(ENCODING_TAG)?;
        if !encoding.eq_ignore_ascii_case("utf-8") {
            return Err(BagError::Format(format!(
                "unsupported encoding: {}",
                encoding
            )));
        }

        let info = if source.is_file(version.tag_file_name()) {
            load_tag_file(source.as_ref(), version.tag_file_name())?
        } else {
            Tags::new()
        };

        let manifest_names = discover_manifests(&path, MANIFEST_PREFIX)?;
        let manifest = Manifest::load(source.as_ref(), &manifest_names)?;

        Ok(Self {
            path,
            version,
            encoding,
            tags,
            info,
            manifest,
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> BagVersion {
        self.version
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Name of the descriptive tag file for this bag's version.
    pub fn tag_file_name(&self) -> &'static str {
        self.version.tag_file_name()
    }

    /// Tags from `bagit.txt`.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Tags from the descriptive tag file; empty if it is absent.
    pub fn info(&self) -> &Tags {
        &self.info
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn entries(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.manifest.entries
    }

    /// Algorithms with a manifest file in this bag.
    pub fn algorithms(&self) -> &BTreeSet<String> {
        &self.manifest.algorithms
    }

    pub fn manifest_files(&self) -> Result<Vec<PathBuf>> {
        Ok(discover_manifests(&self.path, MANIFEST_PREFIX)?
            .into_iter()
            .map(|n| self.path.join(n))
            .collect())
    }

    pub fn tagmanifest_files(&self) -> Result<Vec<PathBuf>> {
        Ok(discover_manifests(&self.path, TAGMANIFEST_PREFIX)?
            .into_iter()
            .map(|n| self.path.join(n))
            .collect())
    }

    /// The declared `Payload-Oxum`, looked up in the descriptive tags first.
    pub fn oxum(&self) -> Option<&str> {
        self.info.get(OXUM_TAG).or_else(|| self.tags.get(OXUM_TAG))
    }

    pub fn has_oxum(&self) -> bool {
        self.oxum().is_some()
    }

    /// Payload files as sorted `data/...` paths.
    pub fn payload_files(&self) -> Result<Vec<String>> {
        payload_files(&self.path)
    }

    /// `(declared but absent, present but undeclared)` payload paths.
    pub fn compare_manifests_with_fs(&self) -> Result<(Vec<String>, Vec<String>)> {
        Ok(compare_manifest_with_fs(
            &self.manifest,
            &self.payload_files()?,
        ))
    }

    pub fn fetch_entries(&self) -> Result<Vec<FetchEntry>> {
        load_fetch_file(self.source.as_ref())
    }

    pub fn files_to_be_fetched(&self) -> Result<Vec<String>> {
        Ok(self.fetch_entries()?.into_iter().map(|e| e.path).collect())
    }

    pub fn urls_to_be_fetched(&self) -> Result<Vec<String>> {
        Ok(self
            .fetch_entries()?
            .into_iter()
            .map(|e| e.url.to_string())
            .collect())
    }

    /// Fetch paths that are not yet present in the payload.
    pub fn compare_fetch_with_fs(&self) -> Result<Vec<String>> {
        let on_disk: BTreeSet<String> = self.payload_files()?.into_iter().collect();
        let pending: BTreeSet<String> = self.files_to_be_fetched()?.into_iter().collect();
        Ok(pending.difference(&on_disk).cloned().collect())
    }

    /// Check the root layout against what this bag may contain.
    pub fn validate_structure(&self) -> Result<()> {
        validate_structure(
            &self.path,
            &RootRules {
                tag_file_name: self.tag_file_name(),
                algorithms: &self.manifest.algorithms,
            },
        )
    }

    /// Payload-Oxum check, skipped when the bag declares none.
    pub fn validate_oxum(&self) -> Result<()> {
        match self.oxum() {
            Some(declared) => validate_oxum(&self.path, declared),
            None => Ok(()),
        }
    }

    /// Structure, then Oxum, then every manifest digest, one file at a time.
    pub fn validate(&self) -> Result<()> {
        info!(bag = %self, "validating bag");
        self.validate_structure()?;
        self.validate_oxum()?;
        validate_entries(self.source.as_ref(), &self.manifest)
    }

    /// Like [`Bag::validate`], hashing up to `options.processes` files at once.
    pub async fn validate_parallel(&self, options: &ValidateOptions) -> Result<()> {
        info!(bag = %self, processes = options.processes, "validating bag");
        self.validate_structure()?;
        self.validate_oxum()?;
        validate_entries_parallel(self.source.clone(), &self.manifest, options.processes).await
    }
}
