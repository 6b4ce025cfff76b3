use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Bag directories to validate
    #[arg(required = true, value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Files hashed at once while checking digests
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub processes: usize,
}
