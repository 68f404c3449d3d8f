//! Human-readable rendering of run reports and plans

use std::fmt;

use action_flow::{BatchSummary, RecordReport, RecoveryOutcome, RunOutcome, SkipReason, StepId};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// Path a record would take, computed from its data only
#[derive(Debug, Clone, Serialize)]
pub struct PlannedRecord {
    pub index: usize,
    pub label: String,
    pub path: Vec<StepId>,
    /// Fields read along the path that the record does not supply
    pub missing: Vec<String>,
}

pub fn outcome_label(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Success => "success",
        RunOutcome::Failure { .. } => "failure",
        RunOutcome::Skipped {
            reason: SkipReason::BatchAborted,
        } => "skipped",
        RunOutcome::Skipped {
            reason: SkipReason::Cancelled,
        } => "cancelled",
    }
}

/// One line per record, as it completes
pub fn render_record_line(report: &RecordReport) -> String {
    let mut line = format!(
        "{:>4}  {:<28}  {:<9}",
        report.index + 1,
        truncate(&report.label, 28),
        outcome_label(&report.outcome)
    );

    match &report.outcome {
        RunOutcome::Success => line.push_str(&format!("  {}ms", report.latency_ms)),
        RunOutcome::Failure { step_id, cause } => {
            line.push_str(&format!("  at {}: {}", step_id, cause));
            match &report.recovery {
                Some(RecoveryOutcome::Recovered { action, .. }) => {
                    line.push_str(&format!(" (recovered via {})", action))
                }
                Some(RecoveryOutcome::Unrecoverable { reason, .. }) => {
                    line.push_str(&format!(" (unrecoverable: {})", reason))
                }
                None => {}
            }
        }
        RunOutcome::Skipped { .. } => {}
    }
    line
}

pub fn render_summary(summary: &BatchSummary) -> String {
    format!(
        "{} records: {} succeeded, {} failed and recovered, {} failed unrecovered, {} skipped",
        summary.total,
        summary.succeeded,
        summary.failed_recovered,
        summary.failed_unrecovered,
        summary.skipped
    )
}

/// Heading printed before the first record line of a run
pub fn render_run_header(
    run_id: impl fmt::Display,
    workflow: &str,
    started_at: DateTime<Utc>,
    records: usize,
) -> String {
    format!(
        "Run {} ({}) started {}, {} records",
        run_id,
        workflow,
        started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        records
    )
}

pub fn render_plan(planned: &[PlannedRecord]) -> String {
    let mut out = String::new();
    for record in planned {
        let path: Vec<&str> = record.path.iter().map(StepId::as_str).collect();
        out.push_str(&format!(
            "{:>4}  {:<28}  {}",
            record.index + 1,
            truncate(&record.label, 28),
            path.join(" > ")
        ));
        if !record.missing.is_empty() {
            out.push_str(&format!("  [missing: {}]", record.missing.join(", ")));
        }
        out.push('\n');
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}
