use super::super::args::ValidateArgs;
use crate::exit_codes;
use bagit_core::{Bag, ValidateOptions};
use std::path::Path;

async fn validate_one(dir: &Path, options: &ValidateOptions) -> bagit_core::Result<Bag> {
    let bag = Bag::open(dir)?;
    bag.validate_parallel(options).await?;
    Ok(bag)
}

pub async fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let options = ValidateOptions {
        processes: args.processes.max(1),
    };
    let mut code = exit_codes::SUCCESS;
    for dir in &args.dirs {
        match validate_one(dir, &options).await {
            Ok(bag) => tracing::info!("{} is valid", bag),
            Err(e) => {
                tracing::error!(dir = %dir.display(), "bag is invalid: {}", e);
                code = exit_codes::combine(code, e.exit_code());
            }
        }
    }
    Ok(code)
}
