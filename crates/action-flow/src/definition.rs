//! Declarative workflow definitions
//!
//! A workflow variant is data: a YAML document naming the steps, the entry,
//! the "ready for next entry" signal, an optional prelude, the recovery
//! policy and the mapping from input columns to record fields.

use std::collections::{BTreeMap, BTreeSet};

use action_primitives::{placeholders, Locator, ProbeError, ReadinessCondition};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::FlowError;
use crate::graph::{validate_step, WorkflowGraph};
use crate::recovery::RecoveryPolicy;
use crate::types::{Branch, StepAction, StepDefinition, StepId, TextSource, Transition};

fn immediate() -> ReadinessCondition {
    ReadinessCondition::Immediate
}

/// Raw step as written in a workflow file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepEntry {
    pub id: String,

    #[serde(default = "immediate")]
    pub wait: ReadinessCondition,

    #[serde(default)]
    pub action: StepAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Locator>,

    #[serde(default)]
    pub settle_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,

    #[serde(default)]
    pub terminal: bool,
}

impl StepEntry {
    fn transition(&self) -> Result<Option<Transition>, FlowError> {
        match (&self.next, &self.branch, self.terminal) {
            (None, None, false) => Ok(None),
            (Some(next), None, false) => Ok(Some(Transition::Next(StepId::new(next.as_str())))),
            (None, Some(branch), false) => Ok(Some(Transition::Branch(branch.clone()))),
            (None, None, true) => Ok(Some(Transition::Terminal)),
            _ => Err(FlowError::InvalidDefinition(format!(
                "Step {} declares more than one of next, branch and terminal",
                self.id
            ))),
        }
    }

    fn into_step(self, transition: Transition) -> StepDefinition {
        StepDefinition {
            id: StepId::new(self.id),
            wait: self.wait,
            action: self.action,
            target: self.target,
            settle_ms: self.settle_ms,
            timeout_ms: self.timeout_ms,
            transition,
        }
    }
}

/// Mapping from input columns to record fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSchema {
    /// Field name to column header; empty means every header is a field
    #[serde(default)]
    pub columns: BTreeMap<String, String>,

    /// Field used as the record's display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Fields whose spreadsheet float suffix `.0` is stripped
    #[serde(default)]
    pub numeric_text: Vec<String>,
}

impl RecordSchema {
    /// Whether `field` is produced by this schema
    pub fn provides(&self, field: &str) -> bool {
        self.columns.is_empty() || self.columns.contains_key(field)
    }

    fn validate(&self, referenced: &BTreeSet<String>) -> Result<(), FlowError> {
        let declared = self
            .label
            .iter()
            .chain(self.numeric_text.iter())
            .chain(referenced.iter());
        for field in declared {
            if !self.provides(field) {
                return Err(FlowError::InvalidDefinition(format!(
                    "Field '{}' is not mapped to any input column",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Workflow file contents before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub entry: String,

    pub ready_signal: ReadinessCondition,

    /// Steps run once before the first record
    #[serde(default)]
    pub prelude: Vec<StepEntry>,

    pub steps: Vec<StepEntry>,

    #[serde(default)]
    pub recovery: RecoveryPolicy,

    #[serde(default)]
    pub record: RecordSchema,
}

impl WorkflowDefinition {
    /// Parse a workflow file; nested conditions and actions are written as
    /// single-key maps (`absent: {class_name: ..}`) rather than YAML tags
    pub fn from_yaml(source: &str) -> Result<Self, FlowError> {
        let deserializer = serde_yaml::Deserializer::from_str(source);
        Ok(serde_yaml::with::singleton_map_recursive::deserialize(
            deserializer,
        )?)
    }

    /// Validate and build the executable workflow
    pub fn into_workflow(self) -> Result<Workflow, FlowError> {
        if self.name.trim().is_empty() {
            return Err(FlowError::InvalidDefinition(
                "Workflow name must not be empty".to_string(),
            ));
        }
        debug!(workflow = %self.name, "Building workflow from definition");

        let mut prelude = Vec::with_capacity(self.prelude.len());
        for raw in self.prelude {
            if raw.transition()?.is_some() {
                return Err(FlowError::InvalidDefinition(format!(
                    "Prelude step {} must not declare a transition",
                    raw.id
                )));
            }
            let step = raw.into_step(Transition::Terminal);
            validate_step(&step)?;
            if !referenced_fields(&step)?.is_empty() {
                return Err(FlowError::InvalidDefinition(format!(
                    "Prelude step {} must not reference record fields",
                    step.id
                )));
            }
            prelude.push(step);
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for raw in self.steps {
            let transition = raw.transition()?.ok_or_else(|| {
                FlowError::InvalidDefinition(format!(
                    "Step {} needs one of next, branch or terminal",
                    raw.id
                ))
            })?;
            steps.push(raw.into_step(transition));
        }

        let graph = WorkflowGraph::new(self.entry, steps, self.ready_signal)?;
        self.recovery.validate()?;
        if let Some(unknown) = self
            .recovery
            .per_step
            .keys()
            .find(|step_id| graph.step(step_id.as_str()).is_none())
        {
            return Err(FlowError::InvalidDefinition(format!(
                "Recovery override names unknown step {}",
                unknown
            )));
        }

        let mut referenced = BTreeSet::new();
        for step in graph.steps() {
            referenced.extend(referenced_fields(step)?);
        }
        self.record.validate(&referenced)?;

        Ok(Workflow {
            name: self.name,
            description: self.description,
            graph,
            prelude,
            recovery: self.recovery,
            record: self.record,
        })
    }
}

/// Record fields a step reads, through branches, text sources or placeholders
fn referenced_fields(step: &StepDefinition) -> Result<BTreeSet<String>, FlowError> {
    let invalid = |err: ProbeError| FlowError::InvalidStructure(format!("Step {}: {}", step.id, err));
    let mut fields = BTreeSet::new();

    for locator in [step.wait.target(), step.target.as_ref()].into_iter().flatten() {
        fields.extend(placeholders(locator.expression()).map_err(invalid)?);
    }
    match &step.action {
        StepAction::Type(TextSource::Field(name)) | StepAction::Select(TextSource::Field(name)) => {
            fields.insert(name.clone());
        }
        StepAction::Type(TextSource::Literal(text)) | StepAction::Select(TextSource::Literal(text)) => {
            fields.extend(placeholders(text).map_err(invalid)?);
        }
        _ => {}
    }
    if let Transition::Branch(branch) = &step.transition {
        fields.insert(branch.field.clone());
    }
    Ok(fields)
}

/// Validated, executable workflow variant
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub graph: WorkflowGraph,
    pub prelude: Vec<StepDefinition>,
    pub recovery: RecoveryPolicy,
    pub record: RecordSchema,
}

impl Workflow {
    pub fn from_yaml(source: &str) -> Result<Self, FlowError> {
        WorkflowDefinition::from_yaml(source)?.into_workflow()
    }

    /// Every record field the steps read
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        self.graph
            .steps()
            .iter()
            .filter_map(|step| referenced_fields(step).ok())
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    const KYC: &str = r#"
name: kyc
description: Vendor form with optional KYC
entry: addVendor
ready_signal:
  absent:
    class_name: MuiModal-backdrop
steps:
  - id: addVendor
    wait:
      clickable:
        xpath: "//button[.//span[text()='+ Add New Vendor']]"
    action: click
    next: companyName
  - id: companyName
    wait:
      visible:
        name: companyName
    action:
      type:
        field: name
    next: addContinue1
  - id: addContinue1
    wait:
      clickable:
        xpath: "//button[@title='Add & Continue']"
    action: click
    branch:
      field: tax_id
      supplied: enterTrn
      absent: skipKyc
  - id: enterTrn
    wait:
      visible:
        name: TRN
    action:
      type:
        field: tax_id
    next: closeForm
  - id: skipKyc
    wait:
      clickable:
        xpath: "//button[.//span[text()='Skip']]"
    action: click
    next: closeForm
  - id: closeForm
    wait:
      clickable:
        xpath: "//button[.//svg[@data-testid='CloseRoundedIcon']]"
    action: click
    settle_ms: 500
    terminal: true
recovery:
  default:
    - kind: refresh
      settle_ms: 3000
record:
  columns:
    name: VendorName
    tax_id: TRN
  label: name
  numeric_text: [tax_id]
"#;

    #[test]
    fn parses_and_validates_workflow() {
        let workflow = Workflow::from_yaml(KYC).unwrap();
        assert_eq!(workflow.name, "kyc");
        assert_eq!(workflow.graph.steps().len(), 6);
        assert_eq!(workflow.graph.terminal().as_str(), "closeForm");
        assert_eq!(workflow.graph.step("closeForm").unwrap().settle_ms, 500);
        assert_eq!(workflow.record.label.as_deref(), Some("name"));

        let fields: Vec<String> = workflow.referenced_fields().into_iter().collect();
        assert_eq!(fields, vec!["name", "tax_id"]);

        let path = workflow
            .graph
            .plan(&Record::new(0).with_field("tax_id", "5"))
            .unwrap();
        assert_eq!(path[3].as_str(), "enterTrn");
    }

    #[test]
    fn nested_conditions_and_actions_read_as_plain_maps() {
        let definition = WorkflowDefinition::from_yaml(KYC).unwrap();
        assert_eq!(
            definition.ready_signal,
            ReadinessCondition::Absent(Locator::ClassName("MuiModal-backdrop".to_string()))
        );

        let company = &definition.steps[1];
        assert_eq!(
            company.wait,
            ReadinessCondition::Visible(Locator::Name("companyName".to_string()))
        );
        assert_eq!(
            company.action,
            StepAction::Type(TextSource::Field("name".to_string()))
        );
        assert_eq!(definition.steps[0].action, StepAction::Click);
    }

    #[test]
    fn unit_conditions_read_as_plain_strings() {
        let source = KYC.replace(
            "steps:\n",
            "prelude:\n  - id: open\n    wait: immediate\n    action: refresh\nsteps:\n",
        );
        let definition = WorkflowDefinition::from_yaml(&source).unwrap();
        assert_eq!(definition.prelude[0].wait, ReadinessCondition::Immediate);
        assert_eq!(definition.prelude[0].action, StepAction::Refresh);
        assert_eq!(definition.into_workflow().unwrap().prelude.len(), 1);
    }

    #[test]
    fn recovery_override_for_unknown_step_is_rejected() {
        let source = KYC.replace(
            "recovery:\n  default:\n",
            "recovery:\n  per_step:\n    addContinu2:\n      - kind: navigate_back\n  default:\n",
        );
        let err = Workflow::from_yaml(&source).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("unknown step addContinu2"));
    }

    #[test]
    fn recovery_override_for_known_step_is_kept() {
        let source = KYC.replace(
            "recovery:\n  default:\n",
            "recovery:\n  per_step:\n    enterTrn:\n      - kind: navigate_back\n  default:\n",
        );
        let workflow = Workflow::from_yaml(&source).unwrap();
        assert_eq!(
            workflow.recovery.actions_for("enterTrn"),
            &[crate::recovery::ResetAction::NavigateBack { settle_ms: 0 }]
        );
    }

    #[test]
    fn missing_transition_is_rejected() {
        let source = KYC.replace("    settle_ms: 500\n    terminal: true\n", "");
        let err = Workflow::from_yaml(&source).unwrap_err();
        assert!(err.to_string().contains("Step closeForm needs one of"));
    }

    #[test]
    fn conflicting_transitions_are_rejected() {
        let source = KYC.replace("    next: companyName\n", "    next: companyName\n    terminal: true\n");
        let err = Workflow::from_yaml(&source).unwrap_err();
        assert!(err.to_string().contains("more than one of"));
    }

    #[test]
    fn unmapped_field_is_rejected() {
        let source = KYC.replace("    tax_id: TRN\n", "");
        let err = Workflow::from_yaml(&source).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("'tax_id' is not mapped"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let source = KYC.replace("description:", "descripton:");
        assert!(matches!(
            Workflow::from_yaml(&source),
            Err(FlowError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn prelude_steps_must_not_branch() {
        let source = KYC.replace(
            "steps:\n",
            "prelude:\n  - id: open\n    wait: immediate\n    action: refresh\n    next: addVendor\nsteps:\n",
        );
        let err = Workflow::from_yaml(&source).unwrap_err();
        assert!(err.to_string().contains("must not declare a transition"));
    }

    #[test]
    fn structural_errors_surface_from_the_graph() {
        let source = KYC.replace("entry: addVendor", "entry: nowhere");
        assert!(matches!(
            Workflow::from_yaml(&source),
            Err(FlowError::InvalidStructure(_))
        ));
    }
}
