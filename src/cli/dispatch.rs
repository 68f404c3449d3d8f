use super::plan::cmd_plan;
use super::run::cmd_run;
use super::validate::cmd_validate;
use super::workflows::cmd_workflows;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use crate::cli::env::CliArgs;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Validate(args) => cmd_validate(args, ctx),
        Commands::Plan(args) => cmd_plan(args, ctx),
        Commands::Workflows => cmd_workflows(ctx),
    }
}
