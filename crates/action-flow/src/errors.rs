//! Workflow configuration and execution errors
//!
//! Step-level failures are not errors: they become [`crate::RunOutcome`]
//! values. Everything here is fatal before (or instead of) a batch run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Workflow graph failed structural validation
    #[error("Invalid workflow structure: {0}")]
    InvalidStructure(String),

    /// Workflow definition could not be parsed or converted
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// Step id not present in the graph
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// One-time setup steps failed; no record was processed
    #[error("Prelude step {step_id} failed: {reason}")]
    PreludeFailed { step_id: String, reason: String },
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::InvalidDefinition(err.to_string())
    }
}

impl FlowError {
    /// Configuration errors prevent a batch from starting
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FlowError::InvalidStructure(_) | FlowError::InvalidDefinition(_)
        )
    }
}
