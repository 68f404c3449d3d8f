//! Form-wizard workflow engine
//!
//! This crate drives a multi-step UI wizard once per input record:
//! - a validated step graph with record-driven branches
//! - a runner that gates every action on a bounded readiness wait
//! - a declarative recovery policy that restores the "ready" state
//! - a lazy batch coordinator with per-record isolation

pub mod batch;
pub mod definition;
pub mod errors;
pub mod graph;
pub mod recovery;
pub mod runner;
pub mod types;

pub use batch::{BatchCoordinator, BatchReport, BatchRun, BatchSummary};
pub use definition::{RecordSchema, Workflow, WorkflowDefinition};
pub use errors::FlowError;
pub use graph::{Next, WorkflowGraph};
pub use recovery::{RecoveryOutcome, RecoveryPolicy, ResetAction};
pub use runner::{RunnerConfig, WizardRunner};
pub use types::{
    Branch, FailureCause, Record, RecordReport, RunOutcome, RunTrace, SkipReason, StepAction,
    StepDefinition, StepId, TextSource, Transition,
};
