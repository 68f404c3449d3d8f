//! Core types for wizard workflows

use action_primitives::{render_template, Locator, ProbeError, ReadinessCondition, UiAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use crate::recovery::RecoveryOutcome;

/// Step identifier, unique within one workflow graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One input row driving exactly one wizard traversal
///
/// Fields are either present with text or absent. Records are built once
/// by the loader and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    index: usize,
    label: String,
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record at `index` (0-based input position)
    pub fn new(index: usize) -> Self {
        Self {
            index,
            label: format!("record #{}", index + 1),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Raw field value, blank or not
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value if it is present and not blank
    pub fn supplied(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.trim().is_empty())
    }

    /// Absent and blank values both count as "not supplied"
    pub fn is_supplied(&self, name: &str) -> bool {
        self.supplied(name).is_some()
    }
}

/// Source of text for type and select actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Value of a record field
    Field(String),

    /// Fixed text, may contain `{field}` placeholders
    Literal(String),
}

impl TextSource {
    pub fn resolve(&self, record: &Record) -> Result<String, ProbeError> {
        match self {
            TextSource::Field(name) => record
                .supplied(name)
                .map(str::to_string)
                .ok_or_else(|| ProbeError::MissingField(name.clone())),
            TextSource::Literal(text) => render_template(text, |name| record.supplied(name)),
        }
    }
}

/// What a step does once its readiness condition holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Only wait
    #[default]
    None,

    /// Native click on the step target
    Click,

    /// Script-dispatched click on the step target
    ScriptClick,

    /// Type text into the step target
    Type(TextSource),

    /// Select an option of the step target
    Select(TextSource),

    /// Go back one history entry
    NavigateBack,

    /// Reload the page
    Refresh,
}

impl StepAction {
    /// Whether the action is fired against an element
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            StepAction::Click | StepAction::ScriptClick | StepAction::Type(_) | StepAction::Select(_)
        )
    }
}

/// Record-driven choice between two successors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Record field deciding the branch
    pub field: String,

    /// Successor when the field is supplied (non-blank)
    pub supplied: StepId,

    /// Successor when the field is absent or blank
    pub absent: StepId,
}

impl Branch {
    pub fn select(&self, record: &Record) -> &StepId {
        if record.is_supplied(&self.field) {
            &self.supplied
        } else {
            &self.absent
        }
    }
}

/// Successor rule of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Next(StepId),
    Branch(Branch),
    Terminal,
}

/// Declarative description of one wizard step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: StepId,

    /// What must hold on the UI before acting
    pub wait: ReadinessCondition,

    pub action: StepAction,

    /// Action target when it differs from the readiness target
    pub target: Option<Locator>,

    /// Delay after the action for completions with no UI signal
    pub settle_ms: u64,

    /// Override of the runner's step timeout
    pub timeout_ms: Option<u64>,

    pub transition: Transition,
}

impl StepDefinition {
    /// Create a terminal step; use [`Self::then`] or [`Self::branch`] to link it
    pub fn new(id: impl Into<String>, wait: ReadinessCondition, action: StepAction) -> Self {
        Self {
            id: StepId::new(id),
            wait,
            action,
            target: None,
            settle_ms: 0,
            timeout_ms: None,
            transition: Transition::Terminal,
        }
    }

    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.transition = Transition::Next(StepId::new(next));
        self
    }

    pub fn branch(
        mut self,
        field: impl Into<String>,
        supplied: impl Into<String>,
        absent: impl Into<String>,
    ) -> Self {
        self.transition = Transition::Branch(Branch {
            field: field.into(),
            supplied: StepId::new(supplied),
            absent: StepId::new(absent),
        });
        self
    }

    pub fn with_target(mut self, target: Locator) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_settle_ms(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.transition, Transition::Terminal)
    }

    /// Candidate successors, regardless of record
    pub fn successors(&self) -> Vec<&StepId> {
        match &self.transition {
            Transition::Next(next) => vec![next],
            Transition::Branch(branch) => vec![&branch.supplied, &branch.absent],
            Transition::Terminal => Vec::new(),
        }
    }

    /// Element the action is fired against
    pub fn action_target(&self) -> Option<&Locator> {
        self.target.as_ref().or_else(|| self.wait.target())
    }

    /// Readiness condition with record placeholders rendered
    pub fn resolve_wait(&self, record: &Record) -> Result<ReadinessCondition, ProbeError> {
        self.wait.render(|name| record.supplied(name))
    }

    /// UI action with record fields substituted, `None` for wait-only steps
    pub fn resolve_action(&self, record: &Record) -> Result<Option<UiAction>, ProbeError> {
        let target = || -> Result<Locator, ProbeError> {
            self.action_target()
                .ok_or_else(|| {
                    ProbeError::Internal(format!("step {} has no action target", self.id))
                })?
                .render(|name| record.supplied(name))
        };

        let action = match &self.action {
            StepAction::None => return Ok(None),
            StepAction::Click => UiAction::Click(target()?),
            StepAction::ScriptClick => UiAction::ScriptClick(target()?),
            StepAction::Type(source) => UiAction::Type {
                target: target()?,
                text: source.resolve(record)?,
            },
            StepAction::Select(source) => UiAction::Select {
                target: target()?,
                option: source.resolve(record)?,
            },
            StepAction::NavigateBack => UiAction::NavigateBack,
            StepAction::Refresh => UiAction::Refresh,
        };
        Ok(Some(action))
    }
}

/// Why a record failed at a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// Readiness condition never held within its bound
    StepTimeout { timeout_ms: u64 },

    /// Target vanished or rejected the action between probe and act
    ActionFailed { reason: String },

    /// A referenced record field is absent or blank
    MissingField { field: String },

    /// The run was cancelled mid-record
    Cancelled,
}

impl From<ProbeError> for FailureCause {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::MissingField(field) => FailureCause::MissingField { field },
            ProbeError::Interrupted(_) => FailureCause::Cancelled,
            other => FailureCause::ActionFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::StepTimeout { timeout_ms } => {
                write!(f, "step timed out after {}ms", timeout_ms)
            }
            FailureCause::ActionFailed { reason } => write!(f, "action failed: {}", reason),
            FailureCause::MissingField { field } => write!(f, "missing field '{}'", field),
            FailureCause::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a record was never attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Recovery failed earlier in the batch; the UI can no longer be trusted
    BatchAborted,

    /// The batch was cancelled
    Cancelled,
}

/// Outcome of one record, produced exactly once per record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure { step_id: StepId, cause: FailureCause },
    Skipped { reason: SkipReason },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failure { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped { .. })
    }
}

/// Runner result: the outcome and the steps attempted, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTrace {
    pub outcome: RunOutcome,
    pub path: Vec<StepId>,
}

/// Per-record report entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordReport {
    /// 0-based input position
    pub index: usize,

    pub label: String,

    pub outcome: RunOutcome,

    /// Steps attempted, ending at the failing step on failure
    pub path: Vec<StepId>,

    /// Present when recovery ran after a failure
    pub recovery: Option<RecoveryOutcome>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub latency_ms: u64,
}

impl RecordReport {
    pub fn new(record: &Record) -> Self {
        let now = Utc::now();
        Self {
            index: record.index(),
            label: record.label().to_string(),
            outcome: RunOutcome::Success,
            path: Vec::new(),
            recovery: None,
            started_at: now,
            finished_at: now,
            latency_ms: 0,
        }
    }

    pub fn skipped(record: &Record, reason: SkipReason) -> Self {
        Self::new(record).with_outcome(RunOutcome::Skipped { reason })
    }

    pub fn with_outcome(mut self, outcome: RunOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_trace(mut self, trace: RunTrace) -> Self {
        self.outcome = trace.outcome;
        self.path = trace.path;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryOutcome) -> Self {
        self.recovery = Some(recovery);
        self
    }

    /// Set finish time and calculate latency
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.latency_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self
    }
}
