use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Make(args) => super::make::run(args).await,
        Command::Validate(args) => super::validate::run(args).await,
    }
}
