//! Error types for building, loading and validating bags.

use crate::manifest::Oxum;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bag operations.
pub type Result<T> = std::result::Result<T, BagError>;

/// Coarse classification of a [`BagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Format,
    Structure,
    ChecksumMismatch,
    MissingPayload,
    UnsupportedAlgorithm,
    Io,
    BuildIncomplete,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A structural rule broken by the bag root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureViolation {
    MissingPayloadDirectory,
    ExtraDirectory(String),
    ExtraTagFile(String),
    UnknownItem(String),
    /// The directory handed to the builder already has a payload entry.
    PayloadCollision(String),
    /// Payload on disk disagrees with the declared `Payload-Oxum`.
    OxumMismatch { expected: Oxum, found: Oxum },
}

impl fmt::Display for StructureViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPayloadDirectory => write!(f, "missing data directory"),
            Self::ExtraDirectory(name) => write!(f, "extra directory found: {}", name),
            Self::ExtraTagFile(name) => write!(f, "extra tag file found: {}", name),
            Self::UnknownItem(name) => write!(f, "unknown item in bag: {}", name),
            Self::PayloadCollision(name) => {
                write!(f, "payload directory name already in use: {}", name)
            }
            Self::OxumMismatch { expected, found } => write!(
                f,
                "oxum error: found {} files and {} bytes on disk; expected {} files and {} bytes",
                found.files, found.bytes, expected.files, expected.bytes
            ),
        }
    }
}

/// One payload file whose recomputed digest differs from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: String,
    pub algorithm: String,
    pub expected: String,
    pub computed: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.algorithm)
    }
}

/// Errors surfaced by the bag engine.
#[derive(Debug, Error)]
pub enum BagError {
    /// Bad or absent root path, or unusable options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed declaration, unsupported version/encoding, malformed tag line or Oxum.
    #[error("format error: {0}")]
    Format(String),

    #[error("structure error: {0}")]
    Structure(StructureViolation),

    /// Every digest mismatch found in one validation pass.
    #[error("{} files failed checksum validation: {}", .0.len(), join_mismatches(.0))]
    ChecksumMismatch(Vec<Mismatch>),

    /// A manifest entry that is not present in the payload.
    #[error("missing payload file: {0}")]
    MissingPayload(String),

    /// No digest algorithm left to compute with.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A build failed and could not be fully rolled back.
    #[error("bag build incomplete: {cause}; left behind: {}", left_behind.join(", "))]
    BuildIncomplete {
        cause: Box<BagError>,
        left_behind: Vec<String>,
    },
}

fn join_mismatches(items: &[Mismatch]) -> String {
    items
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl BagError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Format(_) => ErrorKind::Format,
            Self::Structure(_) => ErrorKind::Structure,
            Self::ChecksumMismatch(_) => ErrorKind::ChecksumMismatch,
            Self::MissingPayload(_) => ErrorKind::MissingPayload,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::Io { .. } => ErrorKind::Io,
            Self::BuildIncomplete { .. } => ErrorKind::BuildIncomplete,
        }
    }

    /// The structural rule that was broken, if this is a structure error.
    pub fn structure_violation(&self) -> Option<&StructureViolation> {
        match self {
            Self::Structure(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if the error describes payload content that no longer matches the bag.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch(_) | Self::MissingPayload(_)
        )
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Format(_) | Self::Structure(_) => 3,
            Self::ChecksumMismatch(_) | Self::MissingPayload(_) => 4,
            Self::UnsupportedAlgorithm(_) => 5,
            Self::BuildIncomplete { .. } => 6,
            Self::Io { .. } => 1,
        }
    }
}

impl From<StructureViolation> for BagError {
    fn from(v: StructureViolation) -> Self {
        Self::Structure(v)
    }
}
