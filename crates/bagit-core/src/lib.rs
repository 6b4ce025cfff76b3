//! BagIt packaging.
//!
//! A bag is a directory holding a payload under `data/` together with
//! checksum manifests and descriptive tag files:
//!
//! ```text
//! my-bag/
//!   bagit.txt            # BagIt-Version, Tag-File-Character-Encoding
//!   bag-info.txt         # descriptive tags, Bagging-Date, Payload-Oxum
//!   manifest-md5.txt     # "<digest>  data/<path>" per payload file
//!   data/...
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bagit_core::{make_bag, Bag, BuildOptions};
//!
//! # async fn demo() -> bagit_core::Result<()> {
//! let mut options = BuildOptions::default();
//! options.bag_info.insert("Contact-Name".into(), "Ed Summers".into());
//! make_bag("example-directory", &options).await?;
//!
//! let bag = Bag::open("example-directory")?;
//! bag.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod bag;
pub mod build;
pub mod checksum;
pub mod config;
pub mod contents;
pub mod errors;
pub mod fetch;
pub mod manifest;
pub mod structure;
pub mod tags;

// Convenience re-exports
pub use bag::Bag;
pub use build::make_bag;
pub use checksum::{Algorithm, ContentSource, FileDigest, LocalSource};
pub use config::{
    BagVersion, BuildOptions, BuildOptionsOverrides, ValidateOptions, STANDARD_BAG_INFO_HEADERS,
};
pub use errors::{BagError, ErrorKind, Mismatch, Result, StructureViolation};
pub use fetch::FetchEntry;
pub use manifest::{Manifest, Oxum};
pub use tags::{parse_tags, TagParser, Tags};
