//! Scripted in-memory page probe
//!
//! Every condition holds and every action succeeds unless a rule says
//! otherwise. Rules are keyed by target locator and apply to any condition
//! kind evaluated against that locator.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    errors::ProbeError,
    probe::PageProbe,
    types::{Locator, ReadinessCondition, UiAction},
};

#[derive(Debug, Clone)]
enum Rule {
    /// Condition fails for the next `remaining` checks, then holds
    Delay { remaining: u32 },
    /// Condition never holds until `release_on` is performed
    Stall { release_on: Option<UiAction> },
}

#[derive(Debug, Default)]
struct FakeState {
    rules: HashMap<Locator, Rule>,
    failing_actions: Vec<UiAction>,
    checks: usize,
    actions: Vec<UiAction>,
    disconnected: bool,
}

/// Fake live surface for tests
#[derive(Debug, Default)]
pub struct FakeProbe {
    state: Mutex<FakeState>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conditions on `target` fail for the next `checks` evaluations
    pub fn delay(&self, target: Locator, checks: u32) {
        self.state
            .lock()
            .rules
            .insert(target, Rule::Delay { remaining: checks });
    }

    /// Conditions on `target` never hold
    pub fn stall(&self, target: Locator) {
        self.state
            .lock()
            .rules
            .insert(target, Rule::Stall { release_on: None });
    }

    /// Conditions on `target` fail until `action` is performed
    pub fn stall_until(&self, target: Locator, action: UiAction) {
        self.state.lock().rules.insert(
            target,
            Rule::Stall {
                release_on: Some(action),
            },
        );
    }

    /// The next attempt to perform `action` fails as if the target vanished
    pub fn fail_action_once(&self, action: UiAction) {
        self.state.lock().failing_actions.push(action);
    }

    /// Every probe call fails with a transport error while disconnected
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.lock().disconnected = disconnected;
    }

    /// Actions performed so far, in order
    pub fn actions(&self) -> Vec<UiAction> {
        self.state.lock().actions.clone()
    }

    pub fn check_count(&self) -> usize {
        self.state.lock().checks
    }

    /// Checks plus actions; stays constant when nothing touches the surface
    pub fn interaction_count(&self) -> usize {
        let state = self.state.lock();
        state.checks + state.actions.len()
    }
}

#[async_trait]
impl PageProbe for FakeProbe {
    async fn check(&self, condition: &ReadinessCondition) -> Result<bool, ProbeError> {
        let mut state = self.state.lock();
        state.checks += 1;
        if state.disconnected {
            return Err(ProbeError::CdpIo("fake surface disconnected".to_string()));
        }

        let Some(target) = condition.target() else {
            return Ok(true);
        };

        match state.rules.get_mut(target) {
            None => Ok(true),
            Some(Rule::Stall { .. }) => Ok(false),
            Some(Rule::Delay { remaining }) => {
                if *remaining == 0 {
                    Ok(true)
                } else {
                    *remaining -= 1;
                    Ok(false)
                }
            }
        }
    }

    async fn perform(&self, action: &UiAction) -> Result<(), ProbeError> {
        let mut state = self.state.lock();
        state.actions.push(action.clone());
        if state.disconnected {
            return Err(ProbeError::CdpIo("fake surface disconnected".to_string()));
        }

        if let Some(pos) = state.failing_actions.iter().position(|a| a == action) {
            state.failing_actions.remove(pos);
            return Err(ProbeError::ActionFailed(format!(
                "target of {} detached before the action",
                action
            )));
        }

        state.rules.retain(|_, rule| match rule {
            Rule::Stall {
                release_on: Some(release),
            } => release != action,
            _ => true,
        });
        Ok(())
    }

    fn describe(&self) -> String {
        "fake page probe".to_string()
    }
}
