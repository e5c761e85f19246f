use std::process::ExitCode;

use anyhow::Result;

use super::check::cmd_check;
use super::env::CliArgs;
use super::validate::cmd_validate;
use super::watch::cmd_watch;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<ExitCode> {
    match cli.command.clone() {
        Commands::Check(args) => cmd_check(args, ctx, cli.output.clone()).await,
        Commands::Validate(args) => cmd_validate(args, ctx, cli.output.clone()).await,
        Commands::Watch(args) => cmd_watch(args, ctx, cli.output.clone()).await,
    }
}
