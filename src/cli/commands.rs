use clap::Subcommand;

use super::plan::PlanArgs;
use super::run::RunArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Drive the wizard once per input record in the attached browser
    Run(RunArgs),

    /// Check a workflow definition without touching the browser
    Validate(ValidateArgs),

    /// Show the steps each record would take
    Plan(PlanArgs),

    /// List the bundled workflow variants
    Workflows,
}
