//! Tag file parsing and writing.
//!
//! Tag files are `Name: Value` records with RFC 2822-style folding: a line
//! starting with whitespace continues the value of the record before it. The
//! folding whitespace collapses to a single space when unfolded.
//!
//! ```text
//! Source-Organization: Library of Congress
//! External-Description: a long description that
//!   continues on the next line
//! ```

use crate::checksum::ContentSource;
use crate::errors::{BagError, Result};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::warn;

/// Iterator over `(name, value)` records of a tag file.
///
/// Records are yielded in file order, once; a record is only emitted when the
/// next record starts or the input ends. Blank lines are skipped everywhere,
/// including between continuation lines.
pub struct TagParser<R: BufRead> {
    reader: R,
    line_buffer: String,
    line_number: usize,
    pending: Option<(String, String)>,
    done: bool,
}

impl<R: BufRead> TagParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buffer: String::new(),
            line_number: 0,
            pending: None,
            done: false,
        }
    }

    fn fail(&mut self, err: BagError) -> Option<Result<(String, String)>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for TagParser<R> {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.line_buffer.clear();
            let n = match self.reader.read_line(&mut self.line_buffer) {
                Ok(n) => n,
                Err(e) => {
                    return self.fail(BagError::Format(format!(
                        "tag file read failed at line {}: {}",
                        self.line_number + 1,
                        e
                    )))
                }
            };
            if n == 0 {
                self.done = true;
                return self.pending.take().map(Ok);
            }
            self.line_number += 1;

            let line = self.line_buffer.as_str();
            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with(char::is_whitespace) {
                match self.pending.as_mut() {
                    Some((_, value)) => {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(line.trim());
                    }
                    None => {
                        let ln = self.line_number;
                        return self.fail(BagError::Format(format!(
                            "line {}: continuation line without a preceding tag",
                            ln
                        )));
                    }
                }
                continue;
            }

            let Some((name, value)) = line.trim().split_once(':') else {
                let ln = self.line_number;
                return self.fail(BagError::Format(format!(
                    "line {}: tag line has no ':' separator",
                    ln
                )));
            };
            let record = (name.trim().to_string(), value.trim().to_string());
            if let Some(prev) = self.pending.replace(record) {
                return Some(Ok(prev));
            }
        }
    }
}

/// Ordered tag mapping. A repeated name keeps its last value, positioned
/// where it last occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: Vec<(String, String)>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let old = self
            .entries
            .iter()
            .position(|(n, _)| *n == name)
            .map(|i| self.entries.remove(i).1);
        self.entries.push((name, value.into()));
        old
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile parsed records, warning on repeated names.
    pub fn from_records<I>(records: I, origin: &str) -> Result<Self>
    where
        I: IntoIterator<Item = Result<(String, String)>>,
    {
        let mut tags = Self::new();
        for record in records {
            let (name, value) = record?;
            if tags.insert(name.clone(), value).is_some() {
                warn!(file = origin, tag = %name, "duplicate tag, keeping last value");
            }
        }
        Ok(tags)
    }
}

/// Parse tag text held in memory.
pub fn parse_tags(text: &str) -> Result<Tags> {
    Tags::from_records(TagParser::new(text.as_bytes()), "<memory>")
}

/// Load a tag file from a content source.
pub fn load_tag_file(source: &dyn ContentSource, rel_path: &str) -> Result<Tags> {
    let reader = source
        .open(rel_path)
        .map_err(|e| BagError::io(source.describe(rel_path), e))?;
    Tags::from_records(TagParser::new(BufReader::new(reader)), rel_path)
        .map_err(|e| match e {
            BagError::Format(msg) => BagError::Format(format!("{}: {}", rel_path, msg)),
            other => other,
        })
}

/// Write `Name: Value` lines in the order given.
pub fn write_tag_file<'a, I>(path: &Path, tags: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = Vec::new();
    for (name, value) in tags {
        writeln!(out, "{}: {}", name, value).map_err(|e| BagError::io(path, e))?;
    }
    std::fs::write(path, out).map_err(|e| BagError::io(path, e))
}
