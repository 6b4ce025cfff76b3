//! Manifest store: payload path -> {algorithm -> hex digest}.
//!
//! Manifest files hold one `<hex-digest>  <relative-path>` line per payload
//! file. Loading accepts any whitespace run between the two fields and an
//! optional leading `*` on the path (the binary-mode marker of line-based
//! checksum tools).

use crate::checksum::{ContentSource, FileDigest};
use crate::errors::{BagError, Result};
use crate::structure::PAYLOAD_DIR;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{error, warn};

pub const MANIFEST_PREFIX: &str = "manifest-";
pub const TAGMANIFEST_PREFIX: &str = "tagmanifest-";
const MANIFEST_SUFFIX: &str = ".txt";

/// Algorithm name of `<prefix><alg>.txt`, if `file_name` has that shape.
pub fn manifest_algorithm<'a>(file_name: &'a str, prefix: &str) -> Option<&'a str> {
    let alg = file_name
        .strip_prefix(prefix)?
        .strip_suffix(MANIFEST_SUFFIX)?;
    if alg.is_empty() || !alg.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return None;
    }
    Some(alg)
}

pub fn manifest_file_name(alg: &str) -> String {
    format!("{}{}{}", MANIFEST_PREFIX, alg, MANIFEST_SUFFIX)
}

pub fn tagmanifest_file_name(alg: &str) -> String {
    format!("{}{}{}", TAGMANIFEST_PREFIX, alg, MANIFEST_SUFFIX)
}

/// Regular files at `root` named `<prefix><alg>.txt`, sorted by name.
pub fn discover_manifests(root: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let listing = std::fs::read_dir(root).map_err(|e| BagError::io(root, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| BagError::io(root, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if manifest_algorithm(&name, prefix).is_some() && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Normalize a manifest path: `/` separators, no `.` or empty components,
/// `..` folded into its parent.
pub fn normalize_path(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Normalized form of a manifest path that names a file under the payload
/// directory; `None` for absolute paths and paths that leave `data/`.
pub fn payload_path(raw: &str) -> Option<String> {
    if raw.starts_with(['/', '\\']) {
        return None;
    }
    let path = normalize_path(raw);
    let mut parts = path.split('/');
    if parts.next() != Some(PAYLOAD_DIR) || parts.next().is_none() {
        return None;
    }
    if path.split('/').any(|part| part == "..") {
        return None;
    }
    Some(path)
}

/// Call `visit` with each line's 1-based number and text, line terminator
/// removed. Lines that are not UTF-8 are logged and skipped.
pub(crate) fn for_each_line<R: BufRead>(
    mut reader: R,
    origin: &str,
    mut visit: impl FnMut(usize, &str),
) -> Result<()> {
    let mut buf = Vec::new();
    let mut number = 0;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| BagError::io(origin, e))?;
        if read == 0 {
            return Ok(());
        }
        number += 1;
        let mut bytes = buf.as_slice();
        if let Some(rest) = bytes.strip_suffix(b"\n") {
            bytes = rest;
        }
        if let Some(rest) = bytes.strip_suffix(b"\r") {
            bytes = rest;
        }
        match std::str::from_utf8(bytes) {
            Ok(line) => visit(number, line),
            Err(_) => error!(
                file = origin,
                line = number,
                "skipping line that is not valid UTF-8: {}",
                String::from_utf8_lossy(bytes)
            ),
        }
    }
}

/// Split a manifest line into `(digest, path)` on the first whitespace run.
/// The path keeps any internal and trailing whitespace.
///
/// Returns `None` for blank lines, comments and malformed lines; the caller
/// decides what to log.
pub fn parse_manifest_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']).trim_start();
    if line.trim_end().is_empty() || line.starts_with('#') {
        return None;
    }
    let (digest, rest) = line.split_once(char::is_whitespace)?;
    let path = rest.trim_start();
    let path = path.strip_prefix('*').unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    Some((digest, path))
}

/// Digests recorded for a bag's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// path -> algorithm -> lowercase hex digest
    pub entries: BTreeMap<String, BTreeMap<String, String>>,
    /// Algorithms with a manifest file, whether or not they are computable here.
    pub algorithms: BTreeSet<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one digest; a repeated `(path, algorithm)` keeps the last value.
    pub fn insert(&mut self, path: &str, alg: &str, digest: &str) {
        let digests = self.entries.entry(path.to_string()).or_default();
        if digests
            .insert(alg.to_string(), digest.to_ascii_lowercase())
            .is_some()
        {
            warn!(algorithm = alg, path, "duplicate manifest entry, keeping last value");
        }
    }

    /// Read every named manifest file through `source`.
    pub fn load(source: &dyn ContentSource, manifest_names: &[String]) -> Result<Self> {
        let mut manifest = Self::new();
        for name in manifest_names {
            let Some(alg) = manifest_algorithm(name, MANIFEST_PREFIX) else {
                continue;
            };
            manifest.algorithms.insert(alg.to_string());
            let reader = source
                .open(name)
                .map_err(|e| BagError::io(source.describe(name), e))?;
            manifest.read_lines(BufReader::new(reader), alg, name)?;
        }
        Ok(manifest)
    }

    fn read_lines<R: BufRead>(&mut self, reader: R, alg: &str, origin: &str) -> Result<()> {
        for_each_line(reader, origin, |number, line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return;
            }
            let entry = parse_manifest_line(line)
                .and_then(|(digest, path)| Some((digest, payload_path(path)?)));
            match entry {
                Some((digest, path)) => self.insert(&path, alg, digest),
                None => error!(
                    file = origin,
                    line = number,
                    "invalid {} manifest entry: {}",
                    alg,
                    trimmed
                ),
            }
        })
    }

    /// Build a manifest from freshly computed digests.
    pub fn from_digests(results: &[FileDigest]) -> Self {
        let mut manifest = Self::new();
        for result in results {
            for (alg, digest) in &result.digests {
                manifest.algorithms.insert(alg.clone());
                manifest.insert(&result.path, alg, digest);
            }
        }
        manifest
    }

    /// Write one `manifest-<alg>.txt` per algorithm under `root`, lines sorted
    /// by path. Returns the written file names.
    pub fn write(&self, root: &Path) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for alg in &self.algorithms {
            let name = manifest_file_name(alg);
            let path = root.join(&name);
            let mut out = Vec::new();
            for (entry_path, digests) in &self.entries {
                if let Some(digest) = digests.get(alg) {
                    writeln!(out, "{}  {}", digest, entry_path).map_err(|e| BagError::io(&path, e))?;
                }
            }
            std::fs::write(&path, out).map_err(|e| BagError::io(&path, e))?;
            written.push(name);
        }
        Ok(written)
    }

    /// Paths declared in the manifest.
    pub fn paths(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Payload size summary: total bytes and file count, `"<bytes>.<count>"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Oxum {
    pub bytes: u64,
    pub files: u64,
}

impl Oxum {
    pub fn new(bytes: u64, files: u64) -> Self {
        Self { bytes, files }
    }

    /// Total over a set of hashed files.
    pub fn from_digests(results: &[FileDigest]) -> Self {
        Self {
            bytes: results.iter().map(|r| r.bytes).sum(),
            files: results.len() as u64,
        }
    }
}

impl fmt::Display for Oxum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bytes, self.files)
    }
}

impl FromStr for Oxum {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BagError::Format(format!("invalid oxum: {}", s));
        let (bytes, files) = s.trim().split_once('.').ok_or_else(invalid)?;
        let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !digits(bytes) || !digits(files) {
            return Err(invalid());
        }
        Ok(Self {
            bytes: bytes.parse().map_err(|_| invalid())?,
            files: files.parse().map_err(|_| invalid())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_names_round_trip_algorithm() {
        assert_eq!(manifest_algorithm("manifest-md5.txt", MANIFEST_PREFIX), Some("md5"));
        assert_eq!(
            manifest_algorithm("tagmanifest-sha256.txt", TAGMANIFEST_PREFIX),
            Some("sha256")
        );
        assert_eq!(manifest_algorithm("manifest-.txt", MANIFEST_PREFIX), None);
        assert_eq!(manifest_algorithm("manifest-md5.txt.bak", MANIFEST_PREFIX), None);
        assert_eq!(manifest_algorithm("tagmanifest-md5.txt", MANIFEST_PREFIX), None);
    }

    #[test]
    fn manifest_line_variants() {
        assert_eq!(
            parse_manifest_line("abc  data/a.txt"),
            Some(("abc", "data/a.txt"))
        );
        assert_eq!(
            parse_manifest_line("abc\t*data/a.txt"),
            Some(("abc", "data/a.txt"))
        );
        assert_eq!(
            parse_manifest_line("abc  data/with space.txt"),
            Some(("abc", "data/with space.txt"))
        );
        assert_eq!(parse_manifest_line("abc"), None);
        assert_eq!(parse_manifest_line("abc  *"), None);
        assert_eq!(parse_manifest_line("# comment"), None);
        assert_eq!(parse_manifest_line("   "), None);
        assert_eq!(
            parse_manifest_line("abc  data/a.txt \r\n"),
            Some(("abc", "data/a.txt "))
        );
    }

    #[test]
    fn payload_paths_stay_under_data() {
        assert_eq!(payload_path("data/x/../a.txt").as_deref(), Some("data/a.txt"));
        assert_eq!(payload_path("data/../../secret.txt"), None);
        assert_eq!(payload_path("data/../bagit.txt"), None);
        assert_eq!(payload_path("/etc/passwd"), None);
        assert_eq!(payload_path("/data/a.txt"), None);
        assert_eq!(payload_path("data"), None);
        assert_eq!(payload_path("other/a.txt"), None);
    }

    #[test]
    fn escaping_entries_are_skipped() {
        let text = "aaa  data/a.txt\nbbb  data/../../secret.txt\nccc  /etc/passwd\n";
        let mut m = Manifest::new();
        m.read_lines(text.as_bytes(), "md5", "manifest-md5.txt").unwrap();
        assert_eq!(m.paths().into_iter().collect::<Vec<_>>(), vec!["data/a.txt"]);
    }

    #[test]
    fn lines_that_are_not_utf8_are_skipped() {
        let bytes: &[u8] = b"aaa  data/a.txt\ngarbage \xff\xfe\nbbb  data/b.txt\r\n";
        let mut m = Manifest::new();
        m.read_lines(bytes, "md5", "manifest-md5.txt").unwrap();
        assert_eq!(m.entries.len(), 2);
        assert_eq!(m.entries["data/b.txt"]["md5"], "bbb");
    }

    #[test]
    fn trailing_whitespace_in_paths_survives_reading() {
        let mut m = Manifest::new();
        m.read_lines(&b"aaa  data/a.txt \n"[..], "md5", "manifest-md5.txt")
            .unwrap();
        assert!(m.entries.contains_key("data/a.txt "));
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path("data/./b//c.txt"), "data/b/c.txt");
        assert_eq!(normalize_path("data\\b\\c.txt"), "data/b/c.txt");
        assert_eq!(normalize_path("data/x/../c.txt"), "data/c.txt");
    }

    #[test]
    fn malformed_lines_are_skipped_and_duplicates_keep_last() {
        let text = "aaa  data/a.txt\nbogus\n\nbbb  data/a.txt\nccc *data/b.txt\n";
        let mut m = Manifest::new();
        m.read_lines(text.as_bytes(), "md5", "manifest-md5.txt").unwrap();
        assert_eq!(m.entries.len(), 2);
        assert_eq!(m.entries["data/a.txt"]["md5"], "bbb");
        assert_eq!(m.entries["data/b.txt"]["md5"], "ccc");
    }

    #[test]
    fn oxum_parses_and_prints() {
        let oxum: Oxum = "11.2".parse().unwrap();
        assert_eq!(oxum, Oxum::new(11, 2));
        assert_eq!(oxum.to_string(), "11.2");
        for bad in ["11", "a.2", "11.", "-1.2", "1.2.3", ""] {
            assert!(bad.parse::<Oxum>().is_err(), "{bad} should not parse");
        }
    }
}
