use std::collections::BTreeSet;
use std::path::PathBuf;

use action_flow::{Record, Workflow};
use action_primitives::ProbeError;
use anyhow::{Context, Result};
use clap::Args;

use crate::cli::context::CliContext;
use crate::cli::output::{emit_structured, OutputFormat};
use crate::records::load_records;
use crate::report::{render_plan, PlannedRecord};
use crate::workflows::resolve;

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    /// Bundled workflow name or path to a workflow file
    #[arg(short, long)]
    pub workflow: String,

    /// CSV file with a header row and one record per line
    #[arg(short, long, value_name = "CSV")]
    pub records: PathBuf,
}

pub fn cmd_plan(args: PlanArgs, ctx: &CliContext) -> Result<()> {
    let workflow = resolve(&args.workflow)?;
    let records = load_records(&args.records, &workflow.record)
        .with_context(|| format!("Failed to load records from {}", args.records.display()))?;

    let planned = records
        .iter()
        .map(|record| plan_record(&workflow, record))
        .collect::<Result<Vec<_>>>()?;

    match ctx.output() {
        OutputFormat::Human => print!("{}", render_plan(&planned)),
        output => emit_structured(&planned, output)?,
    }
    Ok(())
}

/// Path through the graph plus the fields it reads that the record lacks
pub fn plan_record(workflow: &Workflow, record: &Record) -> Result<PlannedRecord> {
    let path = workflow.graph.plan(record)?;

    let mut missing = BTreeSet::new();
    for id in &path {
        let Some(step) = workflow.graph.step(id.as_str()) else {
            continue;
        };
        for result in [
            step.resolve_wait(record).map(|_| ()),
            step.resolve_action(record).map(|_| ()),
        ] {
            if let Err(ProbeError::MissingField(field)) = result {
                missing.insert(field);
            }
        }
    }

    Ok(PlannedRecord {
        index: record.index(),
        label: record.label().to_string(),
        path,
        missing: missing.into_iter().collect(),
    })
}
