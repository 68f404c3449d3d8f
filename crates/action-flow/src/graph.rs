//! Workflow graph - validated state machine of wizard steps

use action_primitives::{placeholders, Locator, ReadinessCondition};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::errors::FlowError;
use crate::types::{Record, StepDefinition, StepId, TextSource, Transition, StepAction};

/// Successor of a step for a given record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Step(StepId),
    Terminal,
}

/// Steps plus a designated entry and the "ready for next entry" signal
///
/// Construction validates the structure, so a graph value is always
/// traversable: every path from the entry ends at the single terminal step.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    entry: StepId,
    steps: Vec<StepDefinition>,
    index: HashMap<StepId, usize>,
    ready_signal: ReadinessCondition,
    terminal: StepId,
}

impl WorkflowGraph {
    pub fn new(
        entry: impl Into<String>,
        steps: Vec<StepDefinition>,
        ready_signal: ReadinessCondition,
    ) -> Result<Self, FlowError> {
        let entry = StepId::new(entry);
        debug!(entry = %entry, steps = steps.len(), "Validating workflow graph");

        if steps.is_empty() {
            return Err(FlowError::InvalidStructure(
                "Workflow must contain at least one step".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if step.id.as_str().trim().is_empty() {
                return Err(FlowError::InvalidStructure(format!(
                    "Step at position {} has an empty id",
                    pos + 1
                )));
            }
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(FlowError::InvalidStructure(format!(
                    "Duplicate step id: {}",
                    step.id
                )));
            }
        }

        if !index.contains_key(&entry) {
            return Err(FlowError::InvalidStructure(format!(
                "Entry step {} does not exist",
                entry
            )));
        }

        let mut terminals = Vec::new();
        for step in &steps {
            validate_step(step)?;
            for successor in step.successors() {
                if !index.contains_key(successor) {
                    return Err(FlowError::InvalidStructure(format!(
                        "Step {} points to unknown step {}",
                        step.id, successor
                    )));
                }
            }
            if step.is_terminal() {
                terminals.push(step.id.clone());
            }
        }
        validate_locator(&ready_signal_label(), ready_signal.target())?;

        let terminal = match terminals.as_slice() {
            [single] => single.clone(),
            [] => {
                return Err(FlowError::InvalidStructure(
                    "Workflow has no terminal step".to_string(),
                ))
            }
            many => {
                let ids: Vec<&str> = many.iter().map(StepId::as_str).collect();
                return Err(FlowError::InvalidStructure(format!(
                    "Workflow has more than one terminal step: {}",
                    ids.join(", ")
                )));
            }
        };

        let graph = Self {
            entry,
            steps,
            index,
            ready_signal,
            terminal,
        };
        graph.check_reachability()?;
        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn entry(&self) -> &StepId {
        &self.entry
    }

    pub fn terminal(&self) -> &StepId {
        &self.terminal
    }

    pub fn ready_signal(&self) -> &ReadinessCondition {
        &self.ready_signal
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.index.get(id).map(|&pos| &self.steps[pos])
    }

    /// Successor of `id` for `record`, decided on record data only
    pub fn next(&self, id: &str, record: &Record) -> Result<Next, FlowError> {
        let step = self
            .step(id)
            .ok_or_else(|| FlowError::UnknownStep(id.to_string()))?;

        Ok(match &step.transition {
            Transition::Next(next) => Next::Step(next.clone()),
            Transition::Branch(branch) => Next::Step(branch.select(record).clone()),
            Transition::Terminal => Next::Terminal,
        })
    }

    /// Full path `record` takes from entry to terminal
    pub fn plan(&self, record: &Record) -> Result<Vec<StepId>, FlowError> {
        let mut path = vec![self.entry.clone()];
        let mut current = self.entry.clone();
        while let Next::Step(next) = self.next(current.as_str(), record)? {
            path.push(next.clone());
            current = next;
        }
        Ok(path)
    }

    fn check_reachability(&self) -> Result<(), FlowError> {
        let mut seen: HashSet<&StepId> = HashSet::new();
        let mut stack = vec![&self.entry];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(step) = self.step(id.as_str()) {
                stack.extend(step.successors());
            }
        }

        let orphans: Vec<&str> = self
            .steps
            .iter()
            .filter(|step| !seen.contains(&step.id))
            .map(|step| step.id.as_str())
            .collect();
        if orphans.is_empty() {
            Ok(())
        } else {
            Err(FlowError::InvalidStructure(format!(
                "Steps unreachable from entry {}: {}",
                self.entry,
                orphans.join(", ")
            )))
        }
    }

    fn check_acyclic(&self) -> Result<(), FlowError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            graph: &WorkflowGraph,
            pos: usize,
            marks: &mut [Mark],
        ) -> Result<(), FlowError> {
            match marks[pos] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(FlowError::InvalidStructure(format!(
                        "Cycle detected at step {}",
                        graph.steps[pos].id
                    )))
                }
                Mark::New => {}
            }
            marks[pos] = Mark::Active;
            for successor in graph.steps[pos].successors() {
                visit(graph, graph.index[successor], marks)?;
            }
            marks[pos] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.steps.len()];
        visit(self, self.index[&self.entry], &mut marks)
    }
}

fn ready_signal_label() -> StepId {
    StepId::new("<ready signal>")
}

fn validate_locator(owner: &StepId, locator: Option<&Locator>) -> Result<(), FlowError> {
    if let Some(locator) = locator {
        if locator.expression().trim().is_empty() {
            return Err(FlowError::InvalidStructure(format!(
                "Step {} has an empty locator",
                owner
            )));
        }
        placeholders(locator.expression()).map_err(|err| {
            FlowError::InvalidStructure(format!("Step {}: {}", owner, err))
        })?;
    }
    Ok(())
}

/// Structural checks on a single step, shared with prelude validation
pub(crate) fn validate_step(step: &StepDefinition) -> Result<(), FlowError> {
    validate_locator(&step.id, step.wait.target())?;
    validate_locator(&step.id, step.target.as_ref())?;

    if step.action.needs_target() && step.action_target().is_none() {
        return Err(FlowError::InvalidStructure(format!(
            "Step {} acts on an element but has neither a target nor a readiness target",
            step.id
        )));
    }

    if let StepAction::Type(TextSource::Literal(text)) | StepAction::Select(TextSource::Literal(text)) =
        &step.action
    {
        placeholders(text).map_err(|err| {
            FlowError::InvalidStructure(format!("Step {}: {}", step.id, err))
        })?;
    }

    if let Transition::Branch(branch) = &step.transition {
        if branch.field.trim().is_empty() {
            return Err(FlowError::InvalidStructure(format!(
                "Step {} branches on an empty field name",
                step.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StepAction, TextSource};

    fn click(id: &str, xpath: &str) -> StepDefinition {
        StepDefinition::new(
            id,
            ReadinessCondition::Clickable(Locator::Xpath(xpath.into())),
            StepAction::Click,
        )
    }

    fn ready() -> ReadinessCondition {
        ReadinessCondition::Absent(Locator::ClassName("MuiModal-backdrop".into()))
    }

    /// addVendor -> companyName -> addContinue1 -> {enterTrn -> addContinue2 | skipKyc} -> closeForm
    fn kyc_graph() -> WorkflowGraph {
        WorkflowGraph::new(
            "addVendor",
            vec![
                click("addVendor", "//button[.//span[text()='+ Add New Vendor']]").then("companyName"),
                StepDefinition::new(
                    "companyName",
                    ReadinessCondition::Visible(Locator::Name("companyName".into())),
                    StepAction::Type(TextSource::Field("name".into())),
                )
                .then("addContinue1"),
                click("addContinue1", "//button[@title='Add & Continue']")
                    .branch("tax_id", "enterTrn", "skipKyc"),
                StepDefinition::new(
                    "enterTrn",
                    ReadinessCondition::Visible(Locator::Name("TRN".into())),
                    StepAction::Type(TextSource::Field("tax_id".into())),
                )
                .then("addContinue2"),
                click("addContinue2", "//button[.//span[text()='Add & Continue']]").then("closeForm"),
                click("skipKyc", "//button[.//span[text()='Skip']]").then("closeForm"),
                click("closeForm", "//button[.//svg[@data-testid='CloseRoundedIcon']]"),
            ],
            ready(),
        )
        .unwrap()
    }

    fn ids(path: &[StepId]) -> Vec<&str> {
        path.iter().map(StepId::as_str).collect()
    }

    #[test]
    fn absent_or_blank_tax_id_selects_skip_branch() {
        let graph = kyc_graph();
        let records = [
            Record::new(0).with_field("name", "Beta"),
            Record::new(1).with_field("name", "Beta").with_field("tax_id", ""),
            Record::new(2).with_field("name", "Beta").with_field("tax_id", " \t "),
        ];
        for record in &records {
            assert_eq!(
                graph.next("addContinue1", record).unwrap(),
                Next::Step("skipKyc".into()),
                "record {:?}",
                record
            );
        }
    }

    #[test]
    fn non_blank_tax_id_selects_fill_branch() {
        let graph = kyc_graph();
        for value in ["12345", " 999 ", "0", "TRN-001"] {
            let record = Record::new(0).with_field("tax_id", value);
            assert_eq!(
                graph.next("addContinue1", &record).unwrap(),
                Next::Step("enterTrn".into()),
                "tax_id {:?}",
                value
            );
        }
    }

    #[test]
    fn plan_follows_branches_to_terminal() {
        let graph = kyc_graph();
        let acme = Record::new(0).with_field("name", "Acme").with_field("tax_id", "12345");
        let beta = Record::new(1).with_field("name", "Beta");

        assert_eq!(
            ids(&graph.plan(&acme).unwrap()),
            vec!["addVendor", "companyName", "addContinue1", "enterTrn", "addContinue2", "closeForm"]
        );
        assert_eq!(
            ids(&graph.plan(&beta).unwrap()),
            vec!["addVendor", "companyName", "addContinue1", "skipKyc", "closeForm"]
        );
        assert_eq!(graph.terminal().as_str(), "closeForm");
    }

    #[test]
    fn next_of_terminal_and_unknown_steps() {
        let graph = kyc_graph();
        let record = Record::new(0);
        assert_eq!(graph.next("closeForm", &record).unwrap(), Next::Terminal);
        assert!(matches!(
            graph.next("nope", &record),
            Err(FlowError::UnknownStep(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = WorkflowGraph::new(
            "a",
            vec![click("a", "//a").then("b"), click("b", "//b"), click("b", "//c")],
            ready(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate step id: b"));
    }

    #[test]
    fn rejects_missing_entry_and_dangling_successor() {
        let err = WorkflowGraph::new("x", vec![click("a", "//a")], ready()).unwrap_err();
        assert!(err.to_string().contains("Entry step x does not exist"));

        let err =
            WorkflowGraph::new("a", vec![click("a", "//a").then("ghost")], ready()).unwrap_err();
        assert!(err.to_string().contains("unknown step ghost"));
    }

    #[test]
    fn rejects_orphans() {
        let err = WorkflowGraph::new(
            "a",
            vec![click("a", "//a").then("c"), click("b", "//b").then("c"), click("c", "//c")],
            ready(),
        )
        .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("unreachable from entry a: b"));
    }

    #[test]
    fn rejects_zero_or_many_terminals() {
        let err = WorkflowGraph::new(
            "a",
            vec![click("a", "//a").then("b"), click("b", "//b").then("a")],
            ready(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no terminal step"));

        let err = WorkflowGraph::new(
            "a",
            vec![
                click("a", "//a").branch("tax_id", "b", "c"),
                click("b", "//b"),
                click("c", "//c"),
            ],
            ready(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than one terminal step: b, c"));
    }

    #[test]
    fn rejects_cycles() {
        let err = WorkflowGraph::new(
            "a",
            vec![
                click("a", "//a").branch("tax_id", "b", "end"),
                click("b", "//b").then("a"),
                click("end", "//end"),
            ],
            ready(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Cycle detected"));
    }

    #[test]
    fn rejects_click_without_any_target() {
        let err = WorkflowGraph::new(
            "a",
            vec![StepDefinition::new(
                "a",
                ReadinessCondition::Immediate,
                StepAction::Click,
            )],
            ready(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("neither a target"));
    }

    #[test]
    fn rejects_malformed_placeholder() {
        let err = WorkflowGraph::new(
            "a",
            vec![click("a", "//span[@title='{tag']")],
            ready(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unterminated placeholder"));
    }
}
