use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::{emit_structured, OutputFormat};
use crate::workflows::resolve;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Bundled workflow name or path to a workflow file
    #[arg(short, long)]
    pub workflow: String,
}

#[derive(Debug, Serialize)]
struct ValidationSummary {
    name: String,
    steps: usize,
    prelude: usize,
    entry: String,
    terminal: String,
    fields: Vec<String>,
}

pub fn cmd_validate(args: ValidateArgs, ctx: &CliContext) -> Result<()> {
    let workflow = resolve(&args.workflow)?;
    let summary = ValidationSummary {
        name: workflow.name.clone(),
        steps: workflow.graph.steps().len(),
        prelude: workflow.prelude.len(),
        entry: workflow.graph.entry().to_string(),
        terminal: workflow.graph.terminal().to_string(),
        fields: workflow.referenced_fields().into_iter().collect(),
    };

    match ctx.output() {
        OutputFormat::Human => {
            println!(
                "{}: valid ({} steps, entry {}, terminal {})",
                summary.name, summary.steps, summary.entry, summary.terminal
            );
            if summary.prelude > 0 {
                println!("  prelude: {} step(s) run once per batch", summary.prelude);
            }
            if !summary.fields.is_empty() {
                println!("  reads: {}", summary.fields.join(", "));
            }
        }
        output => emit_structured(&summary, output)?,
    }
    Ok(())
}
