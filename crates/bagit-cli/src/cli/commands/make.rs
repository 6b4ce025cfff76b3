use super::super::args::MakeArgs;
use crate::exit_codes;
use anyhow::Context;
use bagit_core::{make_bag, BuildOptions, BuildOptionsOverrides};

/// Resolve options: defaults, then the config file, then flags.
pub fn build_options(args: &MakeArgs) -> anyhow::Result<BuildOptions> {
    let mut options = BuildOptions::default();
    if let Some(path) = &args.config {
        let overrides = BuildOptionsOverrides::from_yaml_file(path)
            .with_context(|| format!("failed to load build config: {}", path.display()))?;
        options = options.apply(overrides)?;
    }
    let flags = BuildOptionsOverrides {
        version: args.bagit_version.clone(),
        algorithms: (!args.algorithms.is_empty()).then(|| args.algorithms.clone()),
        processes: args.processes,
        bag_info: args.bag_info.bag_info.clone(),
    };
    Ok(options.apply(flags)?)
}

pub async fn run(args: MakeArgs) -> anyhow::Result<i32> {
    let options = build_options(&args)?;
    let mut code = exit_codes::SUCCESS;
    for dir in &args.dirs {
        match make_bag(dir, &options).await {
            Ok(bag) => tracing::info!("created {}", bag),
            Err(e) => {
                tracing::error!(dir = %dir.display(), "bag creation failed: {}", e);
                code = exit_codes::combine(code, e.exit_code());
            }
        }
    }
    Ok(code)
}
