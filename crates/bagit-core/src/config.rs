//! Build and validation options.
//!
//! Everything the engine needs to know is passed in explicitly; there are no
//! process-wide registries of header names or algorithms.

use crate::errors::{BagError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Descriptive headers a driver may offer as flags. `Bagging-Date` and
/// `Payload-Oxum` are generated and therefore not listed.
pub const STANDARD_BAG_INFO_HEADERS: &[&str] = &[
    "Source-Organization",
    "Organization-Address",
    "Contact-Name",
    "Contact-Phone",
    "Contact-Email",
    "External-Description",
    "External-Identifier",
    "Bag-Size",
    "Bag-Group-Identifier",
    "Bag-Count",
    "Internal-Sender-Identifier",
    "Internal-Sender-Description",
];

/// Supported BagIt versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BagVersion {
    V0_95,
    #[default]
    V0_96,
}

impl BagVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V0_95 => "0.95",
            Self::V0_96 => "0.96",
        }
    }

    /// Name of the descriptive tag file for this version.
    pub fn tag_file_name(&self) -> &'static str {
        match self {
            Self::V0_95 => "package-info.txt",
            Self::V0_96 => "bag-info.txt",
        }
    }
}

impl fmt::Display for BagVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BagVersion {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0.95" => Ok(Self::V0_95),
            "0.96" => Ok(Self::V0_96),
            other => Err(BagError::Format(format!(
                "unsupported bag version: {}",
                other
            ))),
        }
    }
}

/// Options for [`crate::make_bag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub version: BagVersion,
    /// Manifest algorithms; unsupported names are dropped with a warning.
    pub algorithms: Vec<String>,
    /// Checksum workers. `1` hashes one file at a time.
    pub processes: usize,
    /// Descriptive tags written alongside the generated ones.
    pub bag_info: BTreeMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            version: BagVersion::default(),
            algorithms: vec!["md5".to_string()],
            processes: 1,
            bag_info: BTreeMap::new(),
        }
    }
}

/// Partial overrides for `BuildOptions`. Used for config file parsing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOptionsOverrides {
    pub version: Option<String>,
    pub algorithms: Option<Vec<String>>,
    pub processes: Option<usize>,
    #[serde(default)]
    pub bag_info: BTreeMap<String, String>,
}

impl BuildOptionsOverrides {
    /// Parse overrides from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| BagError::Configuration(format!("invalid build config: {}", e)))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BagError::io(path, e))?;
        Self::from_yaml(&text)
    }
}

impl BuildOptions {
    /// Apply overrides onto these options. Only `Some` values override;
    /// `bag_info` entries are merged, overrides winning.
    pub fn apply(self, overrides: BuildOptionsOverrides) -> Result<Self> {
        let version = match overrides.version {
            Some(v) => v.parse()?,
            None => self.version,
        };
        let mut bag_info = self.bag_info;
        bag_info.extend(overrides.bag_info);
        Ok(Self {
            version,
            algorithms: overrides.algorithms.unwrap_or(self.algorithms),
            processes: overrides.processes.unwrap_or(self.processes),
            bag_info,
        })
    }
}

/// Options for [`crate::Bag::validate_parallel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Hash-check workers. `1` checks files sequentially.
    pub processes: usize,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self { processes: 1 }
    }
}
