//! Recovery policy - restore the "ready for next entry" state after a failure

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use action_primitives::{
    await_condition, settle, Locator, PageProbe, ProbeError, ReadinessCondition, UiAction,
    WaitOptions, WaitOutcome,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::FlowError;
use crate::types::StepId;

/// One UI-level reset, tried in order until the ready signal holds again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResetAction {
    /// Go back one history entry
    NavigateBack {
        #[serde(default)]
        settle_ms: u64,
    },

    /// Click the first candidate that is clickable right now
    ClickFirst {
        candidates: Vec<Locator>,
        #[serde(default)]
        settle_ms: u64,
    },

    /// Reload the page
    Refresh {
        #[serde(default)]
        settle_ms: u64,
    },
}

impl ResetAction {
    pub fn settle_ms(&self) -> u64 {
        match self {
            ResetAction::NavigateBack { settle_ms }
            | ResetAction::ClickFirst { settle_ms, .. }
            | ResetAction::Refresh { settle_ms } => *settle_ms,
        }
    }
}

impl fmt::Display for ResetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetAction::NavigateBack { .. } => write!(f, "navigate_back"),
            ResetAction::ClickFirst { candidates, .. } => {
                write!(f, "click_first[")?;
                for (i, candidate) in candidates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", candidate)?;
                }
                write!(f, "]")
            }
            ResetAction::Refresh { .. } => write!(f, "refresh"),
        }
    }
}

/// Result of one recovery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The ready signal held after `action`
    Recovered { action: ResetAction, attempts: u32 },

    /// No reset action restored the ready signal
    Unrecoverable { attempts: u32, reason: String },
}

impl RecoveryOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered { .. })
    }
}

fn default_timeout_ms() -> u64 {
    25_000
}

fn default_poll_interval_ms() -> u64 {
    250
}

/// Ordered reset actions, with optional overrides per failing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Reset actions used when the failing step has no override
    #[serde(default)]
    pub default: Vec<ResetAction>,

    #[serde(default)]
    pub per_step: BTreeMap<StepId, Vec<ResetAction>>,

    /// Bound on the ready-signal wait after each reset action
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            default: Vec::new(),
            per_step: BTreeMap::new(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl RecoveryPolicy {
    pub fn new(default: Vec<ResetAction>) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    pub fn with_step_override(mut self, step_id: impl Into<String>, actions: Vec<ResetAction>) -> Self {
        self.per_step.insert(StepId::new(step_id), actions);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Reset actions applicable after a failure at `step_id`
    pub fn actions_for(&self, step_id: &str) -> &[ResetAction] {
        self.per_step
            .get(step_id)
            .map(Vec::as_slice)
            .unwrap_or(self.default.as_slice())
    }

    pub(crate) fn validate(&self) -> Result<(), FlowError> {
        let all = self
            .default
            .iter()
            .map(|action| ("default", action))
            .chain(self.per_step.iter().flat_map(|(step, actions)| {
                actions.iter().map(move |action| (step.as_str(), action))
            }));
        for (owner, action) in all {
            if let ResetAction::ClickFirst { candidates, .. } = action {
                if candidates.is_empty() {
                    return Err(FlowError::InvalidDefinition(format!(
                        "Recovery click_first for {} has no candidates",
                        owner
                    )));
                }
                if candidates.iter().any(Locator::has_placeholders) {
                    return Err(FlowError::InvalidDefinition(format!(
                        "Recovery locators for {} must not reference record fields",
                        owner
                    )));
                }
            }
        }
        Ok(())
    }

    /// Try each reset action in order until `ready_signal` holds again
    ///
    /// A reset action that cannot be performed is logged and skipped.
    /// Cancellation ends recovery as `Unrecoverable`.
    pub async fn recover(
        &self,
        probe: &dyn PageProbe,
        last_step_id: &StepId,
        ready_signal: &ReadinessCondition,
        cancel: &CancellationToken,
    ) -> RecoveryOutcome {
        let actions = self.actions_for(last_step_id.as_str());
        let opts = WaitOptions::from_millis(self.timeout_ms, self.poll_interval_ms);
        info!(
            step_id = %last_step_id,
            reset_actions = actions.len(),
            "Starting recovery"
        );

        let mut attempts = 0u32;
        for action in actions {
            attempts += 1;
            match self.apply(probe, action, ready_signal, &opts, cancel).await {
                Ok(true) => {
                    info!(step_id = %last_step_id, action = %action, attempts, "Recovered");
                    return RecoveryOutcome::Recovered {
                        action: action.clone(),
                        attempts,
                    };
                }
                Ok(false) => {}
                Err(ProbeError::Interrupted(_)) => {
                    return RecoveryOutcome::Unrecoverable {
                        attempts,
                        reason: "recovery cancelled".to_string(),
                    };
                }
                Err(err) => {
                    warn!(step_id = %last_step_id, action = %action, "Reset action failed: {}", err);
                }
            }
        }

        warn!(step_id = %last_step_id, attempts, "Recovery exhausted");
        RecoveryOutcome::Unrecoverable {
            attempts,
            reason: if actions.is_empty() {
                format!("no reset action configured for step {}", last_step_id)
            } else {
                format!("ready signal not restored after {} reset actions", attempts)
            },
        }
    }

    /// Perform one reset action; `Ok(true)` when the ready signal holds afterwards
    async fn apply(
        &self,
        probe: &dyn PageProbe,
        action: &ResetAction,
        ready_signal: &ReadinessCondition,
        opts: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<bool, ProbeError> {
        match action {
            ResetAction::NavigateBack { .. } => probe.perform(&UiAction::NavigateBack).await?,
            ResetAction::Refresh { .. } => probe.perform(&UiAction::Refresh).await?,
            ResetAction::ClickFirst { candidates, .. } => {
                let Some(target) = first_clickable(probe, candidates).await? else {
                    debug!(action = %action, "No candidate is clickable");
                    return Ok(false);
                };
                probe.perform(&UiAction::Click(target)).await?;
            }
        }

        settle(Duration::from_millis(action.settle_ms()), cancel).await?;

        match await_condition(probe, ready_signal, opts, cancel).await? {
            WaitOutcome::Ready => Ok(true),
            WaitOutcome::TimedOut { waited_ms } => {
                warn!(
                    action = %action,
                    waited_ms,
                    "Ready signal did not hold after reset action"
                );
                Ok(false)
            }
        }
    }
}

async fn first_clickable(
    probe: &dyn PageProbe,
    candidates: &[Locator],
) -> Result<Option<Locator>, ProbeError> {
    for candidate in candidates {
        match probe
            .check(&ReadinessCondition::Clickable(candidate.clone()))
            .await
        {
            Ok(true) => return Ok(Some(candidate.clone())),
            Ok(false) => {}
            Err(err) if err.is_transient() => {
                debug!(candidate = %candidate, "Candidate probe failed: {}", err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}
