// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Workflow definitions.
//!
//! A workflow is an immutable DAG of typed steps.  Validation runs once at
//! registration: step ids must be unique, every `depends` entry must
//! resolve, and the dependency graph must be acyclic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use freja_panel::PanelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Trigger,
    Agent,
    Router,
    Checkpoint,
    /// Alias of `Checkpoint` kept for imported definitions.
    Human,
    Decision,
    /// Alias of `Decision` kept for imported definitions.
    Vote,
    AwaitInput,
    ReviewPanel,
    Split,
    Merge,
    Loop,
    Condition,
    Transform,
    Output,
    PermissionGate,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Agent => "agent",
            Self::Router => "router",
            Self::Checkpoint => "checkpoint",
            Self::Human => "human",
            Self::Decision => "decision",
            Self::Vote => "vote",
            Self::AwaitInput => "await_input",
            Self::ReviewPanel => "review_panel",
            Self::Split => "split",
            Self::Merge => "merge",
            Self::Loop => "loop",
            Self::Condition => "condition",
            Self::Transform => "transform",
            Self::Output => "output",
            Self::PermissionGate => "permission_gate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Wait for every dependency, merge outputs into one object.
    #[default]
    WaitAll,
    /// Proceed with the first completed dependency's output.
    WaitAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    ForEach,
    Times,
    While,
}

/// Explicit condition-node routing.  When absent the scheduler falls back
/// to the id-contains-"true"/"false" convention over dependent steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Branches {
    #[serde(default)]
    pub on_true: Option<String>,
    #[serde(default)]
    pub on_false: Option<String>,
}

/// One node of a workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub denied_tools: Vec<String>,
    #[serde(default)]
    pub review_question: Option<String>,
    #[serde(default)]
    pub review_panel: Option<PanelConfig>,
    #[serde(default)]
    pub merge_strategy: Option<MergeStrategy>,
    #[serde(default)]
    pub loop_type: Option<LoopType>,
    /// Input field holding the array iterated by a `for_each` loop.
    #[serde(default)]
    pub loop_array_field: Option<String>,
    #[serde(default)]
    pub loop_times: Option<u32>,
    /// Upper bound for `while` loops; also caps the other loop types.
    #[serde(default)]
    pub loop_max_iterations: Option<u32>,
    #[serde(default)]
    pub branches: Option<Branches>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            step_type,
            agent: None,
            prompt: None,
            depends: Vec::new(),
            allowed_tools: None,
            denied_tools: Vec::new(),
            review_question: None,
            review_panel: None,
            merge_strategy: None,
            loop_type: None,
            loop_array_field: None,
            loop_times: None,
            loop_max_iterations: None,
            branches: None,
        }
    }

    pub fn agent(id: impl Into<String>, agent: impl Into<String>) -> Self {
        let mut step = Self::new(id, StepType::Agent);
        step.agent = Some(agent.into());
        step
    }

    pub fn with_depends(mut self, depends: &[&str]) -> Self {
        self.depends = depends.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.depends.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),
    #[error("step {step} depends on unknown step {depends}")]
    DanglingDependency { step: String, depends: String },
    #[error("dependency cycle involving step {0}")]
    DependencyCycle(String),
    #[error("workflow has no steps")]
    Empty,
}

/// Immutable workflow definition shared across executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(default = "Workflow::default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub default_agent_id: Option<String>,
    #[serde(default)]
    pub default_allowed_tools: Option<Vec<String>>,
}

impl Workflow {
    fn default_max_iterations() -> u32 {
        10
    }

    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            steps,
            max_iterations: Self::default_max_iterations(),
            default_agent_id: None,
            default_allowed_tools: None,
        }
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps that depend on `id`.
    pub fn dependents(&self, id: &str) -> Vec<&WorkflowStep> {
        self.steps
            .iter()
            .filter(|s| s.depends.iter().any(|d| d == id))
            .collect()
    }

    /// Validate ids, dependency references, and acyclicity.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.steps.is_empty() {
            return Err(ValidationError::Empty);
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(ValidationError::DuplicateStepId(step.id.clone()));
            }
        }

        for step in &self.steps {
            for dep in &step.depends {
                if !ids.contains(dep.as_str()) {
                    return Err(ValidationError::DanglingDependency {
                        step: step.id.clone(),
                        depends: dep.clone(),
                    });
                }
            }
        }

        // Cycle check: iterative DFS with colouring.
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        for start in &self.steps {
            if marks.contains_key(start.id.as_str()) {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(start.id.as_str(), 0)];
            marks.insert(start.id.as_str(), Mark::Visiting);
            while let Some((id, dep_index)) = stack.pop() {
                let step = self.step(id).expect("validated id");
                if dep_index < step.depends.len() {
                    stack.push((id, dep_index + 1));
                    let dep = step.depends[dep_index].as_str();
                    match marks.get(dep) {
                        Some(Mark::Visiting) => {
                            return Err(ValidationError::DependencyCycle(dep.to_string()))
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(dep, Mark::Visiting);
                            stack.push((dep, 0));
                        }
                    }
                } else {
                    marks.insert(id, Mark::Done);
                }
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_chain() -> Workflow {
        Workflow::new(
            "wf",
            "chain",
            vec![
                WorkflowStep::agent("a", "assistant"),
                WorkflowStep::agent("b", "assistant").with_depends(&["a"]),
                WorkflowStep::agent("c", "assistant").with_depends(&["b"]),
            ],
        )
    }

    #[test]
    fn valid_chain_passes() {
        assert!(linear_chain().validate().is_ok());
    }

    #[test]
    fn empty_workflow_is_rejected() {
        let wf = Workflow::new("wf", "empty", vec![]);
        assert!(matches!(wf.validate(), Err(ValidationError::Empty)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let wf = Workflow::new(
            "wf",
            "dup",
            vec![
                WorkflowStep::agent("a", "assistant"),
                WorkflowStep::agent("a", "coder"),
            ],
        );
        assert!(matches!(wf.validate(), Err(ValidationError::DuplicateStepId(_))));
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let wf = Workflow::new(
            "wf",
            "dangling",
            vec![WorkflowStep::agent("a", "assistant").with_depends(&["ghost"])],
        );
        assert!(matches!(
            wf.validate(),
            Err(ValidationError::DanglingDependency { .. })
        ));
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let wf = Workflow::new(
            "wf",
            "cycle",
            vec![
                WorkflowStep::agent("a", "assistant").with_depends(&["b"]),
                WorkflowStep::agent("b", "assistant").with_depends(&["a"]),
            ],
        );
        assert!(matches!(wf.validate(), Err(ValidationError::DependencyCycle(_))));
    }

    #[test]
    fn self_cycle_is_rejected() {
        let wf = Workflow::new(
            "wf",
            "selfloop",
            vec![WorkflowStep::agent("a", "assistant").with_depends(&["a"])],
        );
        assert!(matches!(wf.validate(), Err(ValidationError::DependencyCycle(_))));
    }

    #[test]
    fn diamond_is_acyclic() {
        let wf = Workflow::new(
            "wf",
            "diamond",
            vec![
                WorkflowStep::new("split", StepType::Split),
                WorkflowStep::agent("left", "coder").with_depends(&["split"]),
                WorkflowStep::agent("right", "architect").with_depends(&["split"]),
                WorkflowStep::new("merge", StepType::Merge).with_depends(&["left", "right"]),
            ],
        );
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn dependents_are_found() {
        let wf = linear_chain();
        let deps = wf.dependents("a");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].id, "b");
    }

    #[test]
    fn step_type_round_trips_through_serde() {
        let json = serde_json::to_string(&StepType::AwaitInput).unwrap();
        assert_eq!(json, "\"await_input\"");
        let back: StepType = serde_json::from_str("\"review_panel\"").unwrap();
        assert_eq!(back, StepType::ReviewPanel);
    }

    #[test]
    fn workflow_deserializes_with_type_field() {
        let wf: Workflow = serde_json::from_str(
            r#"{
                "id": "wf1",
                "name": "test",
                "steps": [
                    {"id": "a", "type": "agent", "agent": "coder", "prompt": "build it"},
                    {"id": "b", "type": "output", "depends": ["a"]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(wf.max_iterations, 10);
        assert_eq!(wf.steps[0].step_type, StepType::Agent);
        assert_eq!(wf.steps[1].depends, vec!["a"]);
    }
}
