//! `bagit make` arguments.

use super::BagInfoArgs;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct MakeArgs {
    /// Directories to convert into bags
    #[arg(required = true, value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Checksum workers per bag (1 = no parallelism)
    #[arg(long, value_name = "N")]
    pub processes: Option<usize>,

    /// Manifest algorithm; repeat for several (default: md5)
    #[arg(long = "algorithm", value_name = "ALG")]
    pub algorithms: Vec<String>,

    /// BagIt version to write (0.95 or 0.96)
    #[arg(long, value_name = "VERSION")]
    pub bagit_version: Option<String>,

    /// YAML file with build options (version, algorithms, processes, bag_info)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub bag_info: BagInfoArgs,
}
