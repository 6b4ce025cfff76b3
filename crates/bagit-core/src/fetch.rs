//! `fetch.txt` entries: payload content to be retrieved from elsewhere.
//!
//! Only the parsing contract lives here; transferring the content is up to the
//! caller.

use crate::checksum::ContentSource;
use crate::errors::{BagError, Result};
use crate::manifest::{for_each_line, payload_path};
use std::io::{BufRead, BufReader};
use tracing::warn;
use url::Url;

pub const FETCH_FILE: &str = "fetch.txt";

/// One `<url> <size-or-dash> <path>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEntry {
    pub url: Url,
    /// Declared length in bytes; `None` when given as `-`.
    pub size: Option<u64>,
    pub path: String,
}

/// Parse a single fetch line. The path is everything after the second field,
/// internal and trailing whitespace included, and must stay under `data/`.
pub fn parse_fetch_line(line: &str) -> Option<FetchEntry> {
    let line = line.trim_end_matches(['\r', '\n']).trim_start();
    let (url, rest) = line.split_once(char::is_whitespace)?;
    let (size, path) = rest.trim_start().split_once(char::is_whitespace)?;
    let path = path.trim_start();
    if path.trim_end().is_empty() {
        return None;
    }
    let size = match size {
        "-" => None,
        s => Some(s.parse().ok()?),
    };
    Some(FetchEntry {
        url: Url::parse(url).ok()?,
        size,
        path: payload_path(path)?,
    })
}

/// Read fetch entries; malformed lines are logged and skipped.
pub fn read_fetch_entries<R: BufRead>(reader: R) -> Result<Vec<FetchEntry>> {
    let mut entries = Vec::new();
    for_each_line(reader, FETCH_FILE, |number, line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }
        match parse_fetch_line(line) {
            Some(entry) => entries.push(entry),
            None => warn!(line = number, "invalid fetch entry: {}", trimmed),
        }
    })?;
    Ok(entries)
}

/// Load `fetch.txt` through `source`; an absent file means no entries.
pub fn load_fetch_file(source: &dyn ContentSource) -> Result<Vec<FetchEntry>> {
    if !source.is_file(FETCH_FILE) {
        return Ok(Vec::new());
    }
    let reader = source
        .open(FETCH_FILE)
        .map_err(|e| BagError::io(source.describe(FETCH_FILE), e))?;
    read_fetch_entries(BufReader::new(reader))
}
