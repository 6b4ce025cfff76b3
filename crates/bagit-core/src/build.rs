//! Turning a plain directory into a bag.
//!
//! Every root entry moves under `data/`, the payload is hashed on a worker
//! pool, then manifests, `bagit.txt` and the descriptive tag file are written.
//! A failure after the first mutation undoes what was done so far.

use crate::bag::{Bag, BAGGING_DATE_TAG, ENCODING_TAG, OXUM_TAG, VERSION_TAG};
use crate::checksum::{
    hash_files, resolve_algorithms, Algorithm, ContentSource, HashJob, LocalSource,
};
use crate::config::BuildOptions;
use crate::contents::payload_files;
use crate::errors::{BagError, Result, StructureViolation};
use crate::manifest::{manifest_file_name, Manifest, Oxum};
use crate::structure::{DECLARATION_FILE, PAYLOAD_DIR};
use crate::tags::write_tag_file;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use walkdir::WalkDir;

/// Convert `dir` into a bag in place and return it, opened from disk.
pub async fn make_bag(dir: impl AsRef<Path>, options: &BuildOptions) -> Result<Bag> {
    let root = dir.as_ref().to_path_buf();
    info!(dir = %root.display(), "creating bag");

    if !root.is_dir() {
        error!(dir = %root.display(), "no such bag directory");
        return Err(BagError::Configuration(format!(
            "no such bag directory: {}",
            root.display()
        )));
    }
    let algorithms = resolve_algorithms(options.algorithms.as_slice())?;
    if root.join(PAYLOAD_DIR).symlink_metadata().is_ok() {
        return Err(StructureViolation::PayloadCollision(PAYLOAD_DIR.to_string()).into());
    }
    check_payload_names(&root)?;

    let mut journal = Journal::new(root.clone());
    match build(&mut journal, &algorithms, options).await {
        Ok(bag) => Ok(bag),
        Err(cause) => {
            error!(dir = %root.display(), error = %cause, "bag creation failed, rolling back");
            Err(journal.rollback(cause))
        }
    }
}

/// Every name under `root` must be writable to a manifest line as-is: valid
/// UTF-8, no line breaks, no backslashes (read back as separators).
fn check_payload_names(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            BagError::io(path, e.into())
        })?;
        let problem = match entry.file_name().to_str() {
            None => "is not valid UTF-8",
            Some(name) if name.contains(['\n', '\r']) => "contains a line break",
            Some(name) if name.contains('\\') => "contains a backslash",
            Some(_) => continue,
        };
        error!(path = %entry.path().display(), "unsupported payload file name");
        return Err(BagError::Configuration(format!(
            "cannot bag {}: file name {}",
            entry.path().display(),
            problem
        )));
    }
    Ok(())
}

async fn build(
    journal: &mut Journal,
    algorithms: &[Algorithm],
    options: &BuildOptions,
) -> Result<Bag> {
    let root = journal.root.clone();

    let mut children = Vec::new();
    let listing = std::fs::read_dir(&root).map_err(|e| BagError::io(&root, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| BagError::io(&root, e))?;
        children.push(entry.file_name());
    }
    children.sort();

    info!("creating data dir");
    journal.create_payload_dir()?;
    for name in children {
        journal.relocate(&name)?;
    }

    let jobs: Vec<HashJob> = payload_files(&root)?
        .into_iter()
        .map(|path| HashJob {
            path,
            algorithms: algorithms.to_vec(),
        })
        .collect();
    info!(
        files = jobs.len(),
        processes = options.processes,
        "computing payload checksums"
    );
    let source: Arc<dyn ContentSource> = Arc::new(LocalSource::new(&root));
    let results = hash_files(source, jobs, options.processes).await?;
    let oxum = Oxum::from_digests(&results);

    let mut manifest = Manifest::from_digests(&results);
    for alg in algorithms {
        manifest.algorithms.insert(alg.name().to_string());
        let name = manifest_file_name(alg.name());
        info!("writing {}", name);
        journal.track_file(&name);
    }
    manifest.write(&root)?;

    info!("writing {}", DECLARATION_FILE);
    journal.track_file(DECLARATION_FILE);
    write_tag_file(
        &root.join(DECLARATION_FILE),
        [
            (VERSION_TAG, options.version.as_str()),
            (ENCODING_TAG, "UTF-8"),
        ],
    )?;

    let tag_file_name = options.version.tag_file_name();
    info!("writing {}", tag_file_name);
    let mut bag_info: BTreeMap<String, String> = options.bag_info.clone();
    bag_info.insert(
        BAGGING_DATE_TAG.to_string(),
        chrono::Local::now().format("%Y-%m-%d").to_string(),
    );
    bag_info.insert(OXUM_TAG.to_string(), oxum.to_string());
    journal.track_file(tag_file_name);
    write_tag_file(
        &root.join(tag_file_name),
        bag_info.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )?;

    Bag::open(&root)
}

/// Records build mutations so they can be undone.
struct Journal {
    root: PathBuf,
    payload_dir_created: bool,
    relocated: Vec<OsString>,
    written: Vec<String>,
}

impl Journal {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            payload_dir_created: false,
            relocated: Vec::new(),
            written: Vec::new(),
        }
    }

    fn payload_dir(&self) -> PathBuf {
        self.root.join(PAYLOAD_DIR)
    }

    fn create_payload_dir(&mut self) -> Result<()> {
        let dir = self.payload_dir();
        std::fs::create_dir(&dir).map_err(|e| BagError::io(&dir, e))?;
        self.payload_dir_created = true;
        Ok(())
    }

    fn relocate(&mut self, name: &OsStr) -> Result<()> {
        let from = self.root.join(name);
        let to = self.payload_dir().join(name);
        info!("moving {} to {}", from.display(), to.display());
        std::fs::rename(&from, &to).map_err(|e| BagError::io(&from, e))?;
        self.relocated.push(name.to_os_string());
        Ok(())
    }

    /// Tracked before writing, so a partially written file is cleaned up too.
    fn track_file(&mut self, name: &str) {
        self.written.push(name.to_string());
    }

    /// Undo everything recorded; returns `cause`, or `BuildIncomplete` if
    /// something could not be undone.
    fn rollback(self, cause: BagError) -> BagError {
        let mut left_behind = Vec::new();

        for name in self.written.iter().rev() {
            let path = self.root.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(_) => left_behind.push(name.clone()),
            }
        }
        for name in self.relocated.iter().rev() {
            let from = self.payload_dir().join(name);
            if std::fs::rename(&from, self.root.join(name)).is_err() {
                left_behind.push(format!("{}/{}", PAYLOAD_DIR, name.to_string_lossy()));
            }
        }
        if self.payload_dir_created && std::fs::remove_dir(self.payload_dir()).is_err() {
            left_behind.push(PAYLOAD_DIR.to_string());
        }

        if left_behind.is_empty() {
            cause
        } else {
            error!(left_behind = ?left_behind, "bag rollback incomplete");
            BagError::BuildIncomplete {
                cause: Box::new(cause),
                left_behind,
            }
        }
    }
}
