//! Wizard runner - one record through the workflow graph

use std::time::Duration;

use action_primitives::{await_condition, settle, PageProbe, WaitOptions, WaitOutcome};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::graph::{Next, WorkflowGraph};
use crate::types::{FailureCause, Record, RunOutcome, RunTrace, StepDefinition, StepId};

/// Timing bounds applied to every step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Readiness bound for steps without their own `timeout_ms`
    pub step_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 25_000,
            poll_interval_ms: 250,
        }
    }
}

impl RunnerConfig {
    fn wait_options(&self, timeout_ms: Option<u64>) -> WaitOptions {
        WaitOptions::from_millis(
            timeout_ms.unwrap_or(self.step_timeout_ms),
            self.poll_interval_ms,
        )
    }
}

/// Drives a single record from the entry step to the terminal step
///
/// The runner never retries a step and never cleans up UI state after a
/// failure; that is the recovery policy's job.
#[derive(Debug, Clone, Default)]
pub struct WizardRunner {
    config: RunnerConfig,
}

impl WizardRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub async fn run(
        &self,
        probe: &dyn PageProbe,
        graph: &WorkflowGraph,
        record: &Record,
        cancel: &CancellationToken,
    ) -> RunTrace {
        info!(record = %record.label(), entry = %graph.entry(), "Running record");

        let mut path: Vec<StepId> = Vec::new();
        let mut current = graph.entry().clone();

        loop {
            path.push(current.clone());

            let Some(step) = graph.step(current.as_str()) else {
                return failed(
                    path,
                    current.clone(),
                    FailureCause::ActionFailed {
                        reason: format!("unknown step {}", current),
                    },
                );
            };

            if let Err(cause) = self.execute_step(probe, step, record, cancel).await {
                warn!(record = %record.label(), step_id = %step.id, "Step failed: {}", cause);
                return failed(path, step.id.clone(), cause);
            }

            match graph.next(current.as_str(), record) {
                Ok(Next::Step(next)) => current = next,
                Ok(Next::Terminal) => break,
                Err(err) => {
                    return failed(
                        path,
                        step.id.clone(),
                        FailureCause::ActionFailed {
                            reason: err.to_string(),
                        },
                    )
                }
            }
        }

        // The terminal step only succeeds once the UI is ready for the next entry.
        let opts = self.config.wait_options(None);
        let outcome = match await_condition(probe, graph.ready_signal(), &opts, cancel).await {
            Ok(WaitOutcome::Ready) => RunOutcome::Success,
            Ok(WaitOutcome::TimedOut { .. }) => RunOutcome::Failure {
                step_id: current.clone(),
                cause: FailureCause::StepTimeout {
                    timeout_ms: opts.timeout.as_millis() as u64,
                },
            },
            Err(err) => RunOutcome::Failure {
                step_id: current.clone(),
                cause: err.into(),
            },
        };

        match &outcome {
            RunOutcome::Success => {
                info!(record = %record.label(), steps = path.len(), "Record completed")
            }
            _ => warn!(record = %record.label(), step_id = %current, "Ready signal not restored"),
        }
        RunTrace { outcome, path }
    }

    /// Wait for the step's readiness, perform its action, then settle
    pub async fn execute_step(
        &self,
        probe: &dyn PageProbe,
        step: &StepDefinition,
        record: &Record,
        cancel: &CancellationToken,
    ) -> Result<(), FailureCause> {
        if cancel.is_cancelled() {
            return Err(FailureCause::Cancelled);
        }

        let wait = step.resolve_wait(record)?;
        let action = step.resolve_action(record)?;
        let opts = self.config.wait_options(step.timeout_ms);

        debug!(step_id = %step.id, wait = %wait, "Awaiting step readiness");
        if let WaitOutcome::TimedOut { waited_ms } =
            await_condition(probe, &wait, &opts, cancel).await?
        {
            debug!(step_id = %step.id, waited_ms, "Step readiness timed out");
            return Err(FailureCause::StepTimeout {
                timeout_ms: opts.timeout.as_millis() as u64,
            });
        }

        if let Some(action) = action {
            debug!(step_id = %step.id, action = %action, "Performing step action");
            probe.perform(&action).await?;
        }

        settle(Duration::from_millis(step.settle_ms), cancel).await?;
        Ok(())
    }
}

fn failed(path: Vec<StepId>, step_id: StepId, cause: FailureCause) -> RunTrace {
    RunTrace {
        outcome: RunOutcome::Failure { step_id, cause },
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StepAction, TextSource};
    use action_primitives::testing::FakeProbe;
    use action_primitives::{Locator, ReadinessCondition, UiAction};

    fn add_continue() -> Locator {
        Locator::Xpath("//button[@title='Add & Continue']".into())
    }

    fn backdrop() -> Locator {
        Locator::ClassName("MuiModal-backdrop".into())
    }

    fn graph() -> WorkflowGraph {
        WorkflowGraph::new(
            "companyName",
            vec![
                StepDefinition::new(
                    "companyName",
                    ReadinessCondition::Visible(Locator::Name("companyName".into())),
                    StepAction::Type(TextSource::Field("name".into())),
                )
                .then("addContinue1"),
                StepDefinition::new(
                    "addContinue1",
                    ReadinessCondition::Clickable(add_continue()),
                    StepAction::Click,
                )
                .with_settle_ms(3_000),
            ],
            ReadinessCondition::Absent(backdrop()),
        )
        .unwrap()
    }

    fn runner() -> WizardRunner {
        WizardRunner::new(RunnerConfig {
            step_timeout_ms: 2_000,
            poll_interval_ms: 100,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_step_in_order() {
        let probe = FakeProbe::new();
        let record = Record::new(0).with_field("name", "Acme");

        let trace = runner()
            .run(&probe, &graph(), &record, &CancellationToken::new())
            .await;

        assert_eq!(trace.outcome, RunOutcome::Success);
        assert_eq!(trace.path, vec![StepId::from("companyName"), "addContinue1".into()]);
        assert_eq!(
            probe.actions(),
            vec![
                UiAction::Type {
                    target: Locator::Name("companyName".into()),
                    text: "Acme".into()
                },
                UiAction::Click(add_continue()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn action_waits_for_readiness() {
        let probe = FakeProbe::new();
        probe.delay(add_continue(), 5);
        let record = Record::new(0).with_field("name", "Acme");

        let trace = runner()
            .run(&probe, &graph(), &record, &CancellationToken::new())
            .await;

        assert!(trace.outcome.is_success());
        // companyName, 6 polls for the button, then the ready signal
        assert_eq!(probe.check_count(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn step_timeout_fails_at_that_step() {
        let probe = FakeProbe::new();
        probe.stall(add_continue());
        let record = Record::new(0).with_field("name", "Acme");

        let trace = runner()
            .run(&probe, &graph(), &record, &CancellationToken::new())
            .await;

        assert_eq!(
            trace.outcome,
            RunOutcome::Failure {
                step_id: "addContinue1".into(),
                cause: FailureCause::StepTimeout { timeout_ms: 2_000 }
            }
        );
        assert_eq!(probe.actions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn step_override_bounds_the_wait() {
        let probe = FakeProbe::new();
        probe.stall(Locator::Name("companyName".into()));
        let mut graph_steps = graph().steps().to_vec();
        graph_steps[0] = graph_steps[0].clone().with_timeout_ms(500);
        let graph = WorkflowGraph::new(
            "companyName",
            graph_steps,
            ReadinessCondition::Absent(backdrop()),
        )
        .unwrap();

        let trace = runner()
            .run(&probe, &graph, &Record::new(0).with_field("name", "Acme"), &CancellationToken::new())
            .await;

        assert!(matches!(
            trace.outcome,
            RunOutcome::Failure {
                cause: FailureCause::StepTimeout { timeout_ms: 500 },
                ..
            }
        ));
    }

    #[test]
    fn missing_field_fails_before_touching_the_step() {
        let probe = FakeProbe::new();
        let trace = tokio_test::block_on(runner().run(
            &probe,
            &graph(),
            &Record::new(0),
            &CancellationToken::new(),
        ));

        assert_eq!(
            trace.outcome,
            RunOutcome::Failure {
                step_id: "companyName".into(),
                cause: FailureCause::MissingField {
                    field: "name".into()
                }
            }
        );
        assert_eq!(probe.interaction_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_target_is_an_action_failure() {
        let probe = FakeProbe::new();
        probe.fail_action_once(UiAction::Click(add_continue()));

        let trace = runner()
            .run(
                &probe,
                &graph(),
                &Record::new(0).with_field("name", "Acme"),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            trace.outcome,
            RunOutcome::Failure {
                cause: FailureCause::ActionFailed { .. },
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_signal_timeout_fails_at_terminal_step() {
        let probe = FakeProbe::new();
        probe.stall(backdrop());

        let trace = runner()
            .run(
                &probe,
                &graph(),
                &Record::new(0).with_field("name", "Acme"),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            trace.outcome,
            RunOutcome::Failure {
                step_id: "addContinue1".into(),
                cause: FailureCause::StepTimeout { timeout_ms: 2_000 }
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_is_reported() {
        let probe = FakeProbe::new();
        probe.stall(add_continue());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let trace = runner()
            .run(&probe, &graph(), &Record::new(0).with_field("name", "Acme"), &cancel)
            .await;

        assert_eq!(
            trace.outcome,
            RunOutcome::Failure {
                step_id: "addContinue1".into(),
                cause: FailureCause::Cancelled
            }
        );
    }
}
