//! Batch coordinator - records in input order with per-record isolation

use std::vec::IntoIter;

use action_primitives::PageProbe;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::definition::Workflow;
use crate::errors::FlowError;
use crate::recovery::RecoveryOutcome;
use crate::runner::WizardRunner;
use crate::types::{FailureCause, Record, RecordReport, RunOutcome, SkipReason};

/// Outcome counts of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed_recovered: usize,
    pub failed_unrecovered: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[RecordReport]) -> Self {
        let mut summary = BatchSummary {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            match (&report.outcome, &report.recovery) {
                (RunOutcome::Success, _) => summary.succeeded += 1,
                (RunOutcome::Failure { .. }, Some(RecoveryOutcome::Recovered { .. })) => {
                    summary.failed_recovered += 1
                }
                (RunOutcome::Failure { .. }, _) => summary.failed_unrecovered += 1,
                (RunOutcome::Skipped { .. }, _) => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Everything a finished batch produced, records in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub workflow: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<RecordReport>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Assemble a report from records already drained from a run
    pub fn new(
        run_id: Uuid,
        workflow: &str,
        started_at: DateTime<Utc>,
        records: Vec<RecordReport>,
    ) -> Self {
        let summary = BatchSummary::from_reports(&records);
        info!(
            run_id = %run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed_recovered = summary.failed_recovered,
            failed_unrecovered = summary.failed_unrecovered,
            skipped = summary.skipped,
            "Batch finished"
        );
        Self {
            run_id,
            workflow: workflow.to_string(),
            started_at,
            finished_at: Utc::now(),
            records,
            summary,
        }
    }

    /// Whether an unrecoverable failure stopped the batch early
    pub fn aborted(&self) -> bool {
        self.records.iter().any(|r| {
            r.outcome
                == RunOutcome::Skipped {
                    reason: SkipReason::BatchAborted,
                }
        })
    }

    /// Whether cancellation interrupted a record or left records unattempted
    pub fn cancelled(&self) -> bool {
        self.records.iter().any(|r| {
            matches!(
                r.outcome,
                RunOutcome::Skipped {
                    reason: SkipReason::Cancelled
                } | RunOutcome::Failure {
                    cause: FailureCause::Cancelled,
                    ..
                }
            )
        })
    }
}

/// Runs records one at a time against a single live surface
#[derive(Debug, Clone, Default)]
pub struct BatchCoordinator {
    runner: WizardRunner,
    cancel: CancellationToken,
}

impl BatchCoordinator {
    pub fn new(runner: WizardRunner) -> Self {
        Self {
            runner,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one wired to Ctrl-C
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the workflow prelude, then hand back a lazy per-record run
    ///
    /// No record is touched until the returned [`BatchRun`] is polled.
    pub async fn run_all<'a>(
        &'a self,
        records: Vec<Record>,
        workflow: &'a Workflow,
        probe: &'a dyn PageProbe,
    ) -> Result<BatchRun<'a>, FlowError> {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            workflow = %workflow.name,
            records = records.len(),
            "Starting batch"
        );

        if !workflow.prelude.is_empty() {
            let setup = Record::new(0).with_label("prelude");
            for step in &workflow.prelude {
                if let Err(cause) = self
                    .runner
                    .execute_step(probe, step, &setup, &self.cancel)
                    .await
                {
                    error!(step_id = %step.id, "Prelude failed: {}", cause);
                    return Err(FlowError::PreludeFailed {
                        step_id: step.id.to_string(),
                        reason: cause.to_string(),
                    });
                }
            }
            info!(steps = workflow.prelude.len(), "Prelude completed");
        }

        Ok(BatchRun {
            coordinator: self,
            workflow,
            probe,
            records: records.into_iter(),
            halted: None,
            run_id,
            started_at: Utc::now(),
        })
    }
}

/// Pull-based batch: each `next` processes exactly one record
pub struct BatchRun<'a> {
    coordinator: &'a BatchCoordinator,
    workflow: &'a Workflow,
    probe: &'a dyn PageProbe,
    records: IntoIter<Record>,
    halted: Option<SkipReason>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
}

impl<'a> BatchRun<'a> {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records not yet reported
    pub fn remaining(&self) -> usize {
        self.records.len()
    }

    /// Report for the next record in input order, `None` when exhausted
    pub async fn next(&mut self) -> Option<RecordReport> {
        let record = self.records.next()?;
        let cancel = &self.coordinator.cancel;

        if self.halted.is_none() && cancel.is_cancelled() {
            warn!(run_id = %self.run_id, "Batch cancelled");
            self.halted = Some(SkipReason::Cancelled);
        }
        if let Some(reason) = self.halted {
            return Some(RecordReport::skipped(&record, reason).finish());
        }

        let graph = &self.workflow.graph;
        let report = RecordReport::new(&record);
        let trace = self
            .coordinator
            .runner
            .run(self.probe, graph, &record, cancel)
            .await;

        let recovery = match &trace.outcome {
            RunOutcome::Failure {
                cause: FailureCause::Cancelled,
                ..
            } => {
                self.halted = Some(SkipReason::Cancelled);
                None
            }
            RunOutcome::Failure { step_id, cause } => {
                warn!(record = %record.label(), step_id = %step_id, "Record failed: {}", cause);
                let outcome = self
                    .workflow
                    .recovery
                    .recover(self.probe, step_id, graph.ready_signal(), cancel)
                    .await;
                if let RecoveryOutcome::Unrecoverable { reason, .. } = &outcome {
                    if cancel.is_cancelled() {
                        self.halted = Some(SkipReason::Cancelled);
                    } else {
                        error!(
                            run_id = %self.run_id,
                            record = %record.label(),
                            "Recovery failed, aborting batch: {}",
                            reason
                        );
                        self.halted = Some(SkipReason::BatchAborted);
                    }
                }
                Some(outcome)
            }
            RunOutcome::Success | RunOutcome::Skipped { .. } => None,
        };

        let report = report.with_trace(trace);
        let report = match recovery {
            Some(outcome) => report.with_recovery(outcome),
            None => report,
        };
        Some(report.finish())
    }

    /// Lazy stream of record reports
    pub fn into_stream(self) -> impl Stream<Item = RecordReport> + 'a {
        stream::unfold(self, |mut run| async move {
            let report = run.next().await?;
            Some((report, run))
        })
    }

    /// Drain the remaining records into a report
    pub async fn collect(mut self) -> BatchReport {
        let mut records = Vec::with_capacity(self.records.len());
        while let Some(report) = self.next().await {
            records.push(report);
        }
        BatchReport::new(self.run_id, &self.workflow.name, self.started_at, records)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::testing::FakeProbe;
    use action_primitives::{Locator, UiAction};
    use futures::StreamExt;

    const WORKFLOW: &str = r#"
name: tiny
entry: open
ready_signal:
  absent:
    class_name: MuiModal-backdrop
prelude:
  - id: openForm
    wait:
      clickable:
        xpath: "//button[.//span[text()='+ Add New Vendor']]"
    action: click
steps:
  - id: open
    wait:
      visible:
        name: companyName
    action:
      type:
        field: name
    next: save
  - id: save
    wait:
      clickable:
        xpath: "//button[@title='Add']"
    action: click
    terminal: true
recovery:
  timeout_ms: 1000
  default:
    - kind: navigate_back
record:
  columns:
    name: VendorName
"#;

    fn save() -> Locator {
        Locator::Xpath("//button[@title='Add']".into())
    }

    fn records(names: &[&str]) -> Vec<Record> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Record::new(i).with_field("name", *name))
            .collect()
    }

    fn coordinator() -> BatchCoordinator {
        BatchCoordinator::new(WizardRunner::new(crate::RunnerConfig {
            step_timeout_ms: 1_000,
            poll_interval_ms: 100,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn prelude_runs_once_before_records() {
        let workflow = Workflow::from_yaml(WORKFLOW).unwrap();
        let probe = FakeProbe::new();
        let coordinator = coordinator();

        let report = coordinator
            .run_all(records(&["Acme", "Beta"]), &workflow, &probe)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(report.summary.succeeded, 2);
        let opens = probe
            .actions()
            .iter()
            .filter(|a| matches!(a, UiAction::Click(Locator::Xpath(x)) if x.contains("Add New Vendor")))
            .count();
        assert_eq!(opens, 1);
        assert!(matches!(probe.actions()[0], UiAction::Click(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn prelude_failure_processes_no_record() {
        let workflow = Workflow::from_yaml(WORKFLOW).unwrap();
        let probe = FakeProbe::new();
        probe.stall(Locator::Xpath("//button[.//span[text()='+ Add New Vendor']]".into()));
        let coordinator = coordinator();

        let err = coordinator
            .run_all(records(&["Acme"]), &workflow, &probe)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, FlowError::PreludeFailed { ref step_id, .. } if step_id == "openForm"));
        assert!(probe.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_is_lazy() {
        let workflow = Workflow::from_yaml(WORKFLOW).unwrap();
        let probe = FakeProbe::new();
        let coordinator = coordinator();

        let mut run = coordinator
            .run_all(records(&["Acme", "Beta"]), &workflow, &probe)
            .await
            .unwrap();
        let after_prelude = probe.interaction_count();
        assert_eq!(run.remaining(), 2);

        let first = run.next().await.unwrap();
        assert_eq!(first.label, "record #1");
        assert!(probe.interaction_count() > after_prelude);
        assert_eq!(run.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_yields_reports_in_input_order() {
        let workflow = Workflow::from_yaml(WORKFLOW).unwrap();
        let probe = FakeProbe::new();
        probe.stall_until(save(), UiAction::NavigateBack);
        let coordinator = coordinator();

        let reports: Vec<RecordReport> = coordinator
            .run_all(records(&["Acme", "Beta", "Gamma"]), &workflow, &probe)
            .await
            .unwrap()
            .into_stream()
            .collect()
            .await;

        let indexes: Vec<usize> = reports.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(reports[0].outcome.is_failure());
        assert!(reports[0].recovery.as_ref().unwrap().is_recovered());
        assert!(reports[1].outcome.is_success());
        assert!(reports[2].outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_batch_skips_the_rest() {
        let workflow = Workflow::from_yaml(WORKFLOW).unwrap();
        let probe = FakeProbe::new();
        let coordinator = coordinator();

        let mut run = coordinator
            .run_all(records(&["Acme", "Beta", "Gamma"]), &workflow, &probe)
            .await
            .unwrap();
        assert!(run.next().await.unwrap().outcome.is_success());

        coordinator.cancellation_token().cancel();
        let report = run.collect().await;

        assert_eq!(report.records.len(), 2);
        assert!(report.records.iter().all(|r| r.outcome
            == RunOutcome::Skipped {
                reason: SkipReason::Cancelled
            }));
        assert_eq!(report.summary.skipped, 2);
        assert!(report.cancelled());
        assert!(!report.aborted());
    }

    #[test]
    fn summary_counts_each_outcome_once() {
        let record = Record::new(0);
        let reports = vec![
            RecordReport::new(&record),
            RecordReport::new(&record)
                .with_outcome(RunOutcome::Failure {
                    step_id: "save".into(),
                    cause: FailureCause::Cancelled,
                })
                .with_recovery(RecoveryOutcome::Recovered {
                    action: crate::ResetAction::Refresh { settle_ms: 0 },
                    attempts: 1,
                }),
            RecordReport::new(&record).with_outcome(RunOutcome::Failure {
                step_id: "save".into(),
                cause: FailureCause::Cancelled,
            }),
            RecordReport::skipped(&record, SkipReason::BatchAborted),
        ];

        let summary = BatchSummary::from_reports(&reports);
        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                succeeded: 1,
                failed_recovered: 1,
                failed_unrecovered: 1,
                skipped: 1,
            }
        );
        assert!(!summary.all_succeeded());
    }
}
