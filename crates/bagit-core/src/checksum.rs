//! Checksum engine: single-pass multi-algorithm digests and a bounded worker pool.
//!
//! Every requested algorithm is fed the same blocks, so a file is read exactly
//! once no matter how many digests are wanted.

use crate::errors::{BagError, Result};
use sha2::Digest;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Read block size for hashing.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Locally computable digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    pub const ALL: &'static [Algorithm] = &[
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    /// Look up an algorithm by manifest name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    fn hasher(&self) -> Hasher {
        match self {
            Self::Md5 => Hasher::Md5(md5::Context::new()),
            Self::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            Self::Sha224 => Hasher::Sha224(sha2::Sha224::new()),
            Self::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            Self::Sha384 => Hasher::Sha384(sha2::Sha384::new()),
            Self::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve algorithm names, dropping unsupported ones with a warning.
///
/// Duplicates collapse; the result keeps first-seen order.
pub fn resolve_algorithms<S: AsRef<str>>(names: &[S]) -> Result<Vec<Algorithm>> {
    let mut out: Vec<Algorithm> = Vec::new();
    for name in names {
        let name = name.as_ref();
        match Algorithm::parse(name) {
            Some(alg) if !out.contains(&alg) => out.push(alg),
            Some(_) => {}
            None => warn!(algorithm = name, "dropping unsupported hash algorithm"),
        }
    }
    if out.is_empty() {
        let requested: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        return Err(BagError::UnsupportedAlgorithm(format!(
            "none of the hash algorithms in {:?} are supported",
            requested
        )));
    }
    Ok(out)
}

enum Hasher {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
}

impl Hasher {
    fn update(&mut self, block: &[u8]) {
        match self {
            Self::Md5(h) => h.consume(block),
            Self::Sha1(h) => h.update(block),
            Self::Sha224(h) => h.update(block),
            Self::Sha256(h) => h.update(block),
            Self::Sha384(h) => h.update(block),
            Self::Sha512(h) => h.update(block),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => format!("{:x}", md5::Digest::from(h)),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha224(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha384(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Feeds one byte stream to several digest algorithms at once.
pub struct MultiHasher {
    hashers: Vec<(Algorithm, Hasher)>,
    bytes: u64,
}

impl MultiHasher {
    pub fn new(algorithms: &[Algorithm]) -> Self {
        Self {
            hashers: algorithms.iter().map(|a| (*a, a.hasher())).collect(),
            bytes: 0,
        }
    }

    pub fn update(&mut self, block: &[u8]) {
        self.bytes += block.len() as u64;
        for (_, h) in &mut self.hashers {
            h.update(block);
        }
    }

    /// Bytes consumed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Lowercase hex digest per algorithm name.
    pub fn finalize(self) -> BTreeMap<String, String> {
        self.hashers
            .into_iter()
            .map(|(alg, h)| (alg.name().to_string(), h.finalize_hex()))
            .collect()
    }
}

/// Stream `reader` through every algorithm in `BLOCK_SIZE` blocks.
pub fn digest_reader<R: Read>(
    mut reader: R,
    algorithms: &[Algorithm],
) -> io::Result<(BTreeMap<String, String>, u64)> {
    let mut hasher = MultiHasher::new(algorithms);
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    let bytes = hasher.bytes();
    Ok((hasher.finalize(), bytes))
}

/// Where file content is read from.
pub trait ContentSource: fmt::Debug + Send + Sync {
    /// Open a file by bag-relative, forward-slash path.
    fn open(&self, rel_path: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Whether a regular file exists at `rel_path`.
    fn is_file(&self, rel_path: &str) -> bool;

    /// Human-readable location, for error messages.
    fn describe(&self, rel_path: &str) -> PathBuf;
}

/// Content source backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel_path: &str) -> PathBuf {
        rel_path
            .split('/')
            .filter(|c| !c.is_empty())
            .fold(self.root.clone(), |acc, c| acc.join(c))
    }
}

impl ContentSource for LocalSource {
    fn open(&self, rel_path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.path(rel_path))?))
    }

    fn is_file(&self, rel_path: &str) -> bool {
        self.path(rel_path).is_file()
    }

    fn describe(&self, rel_path: &str) -> PathBuf {
        self.path(rel_path)
    }
}

/// Digests, relative path and size of one hashed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub path: String,
    pub digests: BTreeMap<String, String>,
    pub bytes: u64,
}

/// Hash one file from `source`. A missing file is [`BagError::MissingPayload`].
pub fn digest_file(
    source: &dyn ContentSource,
    rel_path: &str,
    algorithms: &[Algorithm],
) -> Result<FileDigest> {
    let reader = source.open(rel_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            BagError::MissingPayload(rel_path.to_string())
        } else {
            BagError::io(source.describe(rel_path), e)
        }
    })?;
    let (digests, bytes) =
        digest_reader(reader, algorithms).map_err(|e| BagError::io(source.describe(rel_path), e))?;
    debug!(path = rel_path, bytes, "hashed file");
    Ok(FileDigest {
        path: rel_path.to_string(),
        digests,
        bytes,
    })
}

/// One unit of work for [`hash_files`]: a path and the algorithms it needs.
#[derive(Debug, Clone)]
pub struct HashJob {
    pub path: String,
    pub algorithms: Vec<Algorithm>,
}

/// Hash many files on a bounded pool of `processes` workers.
///
/// Each job runs independently on the blocking pool. All jobs are joined
/// before anything is returned; results come back in completion order. If any
/// job failed, the error of the lexicographically first failing path wins so
/// the outcome does not depend on scheduling.
pub async fn hash_files(
    source: Arc<dyn ContentSource>,
    jobs: Vec<HashJob>,
    processes: usize,
) -> Result<Vec<FileDigest>> {
    let permits = Arc::new(Semaphore::new(processes.max(1)));
    let mut join_set = JoinSet::new();
    let total = jobs.len();

    for job in jobs {
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BagError::Configuration(format!("checksum worker pool closed: {}", e)))?;
        let source = source.clone();
        join_set.spawn_blocking(move || {
            let _permit = permit;
            let res = digest_file(source.as_ref(), &job.path, &job.algorithms);
            (job.path, res)
        });
    }

    let mut results = Vec::with_capacity(total);
    let mut failures: Vec<(String, BagError)> = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((_, Ok(digest))) => results.push(digest),
            Ok((path, Err(e))) => failures.push((path, e)),
            Err(e) => failures.push((
                String::new(),
                BagError::Configuration(format!("checksum worker failed: {}", e)),
            )),
        }
    }

    if let Some((_, err)) = failures.into_iter().min_by(|a, b| a.0.cmp(&b.0)) {
        return Err(err);
    }
    Ok(results)
}
