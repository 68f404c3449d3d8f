use std::path::PathBuf;
use std::time::Duration;

use action_flow::{BatchCoordinator, BatchReport, WizardRunner};
use anyhow::{bail, Context, Result};
use cdp_adapter::CdpPageProbe;
use clap::Args;
use futures::StreamExt;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::cli::output::{emit_structured, OutputFormat};
use crate::records::load_records;
use crate::report::{render_record_line, render_run_header, render_summary};
use crate::workflows::resolve;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Bundled workflow name or path to a workflow file
    #[arg(short, long)]
    pub workflow: String,

    /// CSV file with a header row and one record per line
    #[arg(short, long, value_name = "CSV")]
    pub records: PathBuf,

    /// Remote-debugging endpoint of the browser (overrides config)
    #[arg(long, value_name = "URL")]
    pub debugger: Option<String>,

    /// Readiness bound per step, e.g. "30s" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub step_timeout: Option<Duration>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let mut config = ctx.config().clone();
    if let Some(url) = args.debugger {
        config.debugger_url = url;
    }
    if let Some(step_timeout) = args.step_timeout {
        config.step_timeout_ms = step_timeout.as_millis() as u64;
    }

    let mut workflow = resolve(&args.workflow)?;
    if let Some(timeout_ms) = config.recovery_timeout_ms {
        workflow.recovery = workflow.recovery.with_timeout_ms(timeout_ms);
    }

    // Records are loaded first so a bad file never touches the browser.
    let records = load_records(&args.records, &workflow.record)
        .with_context(|| format!("Failed to load records from {}", args.records.display()))?;
    if records.is_empty() {
        warn!("No records in {}", args.records.display());
        return Ok(());
    }

    let probe = CdpPageProbe::attach(&config.cdp_config())
        .await
        .with_context(|| format!("Failed to attach to browser at {}", config.debugger_url))?;

    let cancel = CancellationToken::new();
    let coordinator = BatchCoordinator::new(WizardRunner::new(config.runner_config()))
        .with_cancellation(cancel.clone());
    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling the batch");
            cancel.cancel();
        }
    });

    info!(
        workflow = %workflow.name,
        records = records.len(),
        "Starting batch"
    );
    let run = coordinator.run_all(records, &workflow, &probe).await?;

    let report = match ctx.output() {
        OutputFormat::Human => {
            let run_id = run.run_id();
            let started_at = run.started_at();
            let workflow_name = run.workflow_name().to_string();
            println!(
                "{}",
                render_run_header(run_id, &workflow_name, started_at, run.remaining())
            );

            let stream = run.into_stream();
            futures::pin_mut!(stream);
            let mut reports = Vec::new();
            while let Some(record) = stream.next().await {
                println!("{}", render_record_line(&record));
                reports.push(record);
            }

            let report = BatchReport::new(run_id, &workflow_name, started_at, reports);
            println!("{}", render_summary(&report.summary));
            report
        }
        output => {
            let report = run.collect().await;
            emit_structured(&report, output)?;
            report
        }
    };
    interrupt.abort();

    ensure_completed(&report)
}

/// Fail the command when records were left unattempted
fn ensure_completed(report: &BatchReport) -> Result<()> {
    if report.aborted() {
        bail!(
            "Batch aborted after an unrecoverable failure ({} records skipped)",
            report.summary.skipped
        );
    }
    if report.cancelled() {
        bail!("Batch cancelled ({} records skipped)", report.summary.skipped);
    }
    Ok(())
}
