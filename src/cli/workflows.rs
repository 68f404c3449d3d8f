use anyhow::Result;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::cli::output::{emit_structured, OutputFormat};
use crate::workflows::bundled;

#[derive(Debug, Serialize)]
struct WorkflowListing {
    name: String,
    description: String,
    steps: usize,
}

pub fn cmd_workflows(ctx: &CliContext) -> Result<()> {
    let listings: Vec<WorkflowListing> = bundled()?
        .into_iter()
        .map(|workflow| WorkflowListing {
            steps: workflow.graph.steps().len(),
            name: workflow.name,
            description: workflow.description,
        })
        .collect();

    match ctx.output() {
        OutputFormat::Human => {
            for listing in &listings {
                println!(
                    "{:<14} {:>3} steps  {}",
                    listing.name, listing.steps, listing.description
                );
            }
        }
        output => emit_structured(&listings, output)?,
    }
    Ok(())
}
