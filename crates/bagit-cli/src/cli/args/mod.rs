use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod bag_info;
pub mod make;
pub mod validate;
pub use bag_info::*;
pub use make::*;
pub use validate::*;

#[derive(Parser, Debug)]
#[command(
    name = "bagit",
    version,
    about = "Create and validate BagIt bags: payload directories with checksum manifests and descriptive tags"
)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert directories into bags in place
    Make(MakeArgs),
    /// Check the structure, Payload-Oxum and checksums of existing bags
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    /// Write log output to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Only log errors
    #[arg(long, global = true)]
    pub quiet: bool,
}
