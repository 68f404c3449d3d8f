//! Page probe trait
//!
//! Splits "wait" from "act": [`PageProbe::check`] evaluates a readiness
//! condition once, [`PageProbe::perform`] fires an action with no implicit
//! waiting. Callers gate every action with [`crate::await_condition`].

use async_trait::async_trait;

use crate::{
    errors::ProbeError,
    types::{ReadinessCondition, UiAction},
};

/// Handle on the live UI surface
///
/// Implementations are the only code allowed to mutate the surface. The
/// surface is a single shared resource, so callers must never issue
/// overlapping calls against one probe.
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// Evaluate `condition` once against the current surface
    async fn check(&self, condition: &ReadinessCondition) -> Result<bool, ProbeError>;

    /// Fire `action` against an already-resolved target
    ///
    /// Returns [`ProbeError::ActionFailed`] when the target disappeared or
    /// rejected the action since it was last probed.
    async fn perform(&self, action: &UiAction) -> Result<(), ProbeError>;

    /// Human readable description of the attached surface
    fn describe(&self) -> String {
        "page probe".to_string()
    }
}
