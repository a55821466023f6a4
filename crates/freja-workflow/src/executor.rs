// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use freja_agents::AgentRegistry;
use freja_config::{Config, WorkflowConfig};
use freja_ecp::EcpTransport;
use freja_panel::ReviewPanelService;
use freja_permissions::PermissionService;
use freja_session::{ProviderFactory, SessionManager};
use freja_tools::{translator_for, ToolExecutor};
use freja_state::{
    ContextItem, ContextItemType, Execution, ExecutionMessage, ExecutionStatus, MessageRole,
    NodeExecution, NodeExecutionStatus, StateStore,
};

use crate::agent_node::DelegateAck;
use crate::notify::Notifier;
use crate::step::{MergeStrategy, StepType, Workflow, WorkflowStep};

/// Hidden tool name agents use to delegate to another agent.
pub(crate) const DELEGATE_TOOL: &str = "DelegateToAgent";

/// Result of one `execute_step` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepProgress {
    /// One node ran; the execution is still running.
    Ran { node_id: String },
    /// The execution paused (checkpoint or input wait).
    Paused,
    /// No node was ready; the execution completed.
    Completed,
}

/// What a node handler tells the scheduler to do next.
#[derive(Debug, Default)]
pub(crate) struct NodeOutcome {
    pub output: Value,
    /// Explicit routing; `None` falls back to readiness resolution.
    pub next_node_id: Option<String>,
    /// Pause the execution in this status after recording the node.
    pub pause: Option<ExecutionStatus>,
    pub increment_iteration: bool,
    pub complete_execution: bool,
    /// Keep the node execution `Running` (checkpoints stay open until the
    /// human decides).
    pub leave_node_running: bool,
    /// Set the execution's final output (output nodes).
    pub final_output: Option<Value>,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// The DAG scheduler: resolves ready steps, dispatches node handlers, and
/// owns the per-execution side state (dynamic handoff nodes, loop counters,
/// handoff depth).
pub struct WorkflowExecutor {
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) sessions: Arc<SessionManager>,
    pub(crate) agents: Arc<AgentRegistry>,
    pub(crate) panels: Arc<ReviewPanelService>,
    pub(crate) config: WorkflowConfig,
    pub(crate) notifier: Notifier,
    workflows: StdMutex<HashMap<String, Workflow>>,
    pub(crate) dynamic_nodes: StdMutex<HashMap<String, Vec<WorkflowStep>>>,
    pub(crate) handoff_depth: StdMutex<HashMap<String, u32>>,
    pub(crate) loop_state: StdMutex<HashMap<(String, String), u32>>,
}

impl WorkflowExecutor {
    pub fn new(
        store: Arc<dyn StateStore>,
        sessions: Arc<SessionManager>,
        agents: Arc<AgentRegistry>,
        panels: Arc<ReviewPanelService>,
        config: WorkflowConfig,
    ) -> Self {
        // The delegation tool is workflow-internal: the session loop treats
        // it as pre-approved and the handler just acknowledges – the actual
        // dynamic-node injection happens after the agent turn completes.
        sessions
            .executor()
            .register_hidden(DELEGATE_TOOL, Arc::new(DelegateAck));

        Self {
            store,
            sessions,
            agents,
            panels,
            config,
            notifier: Notifier::new(),
            workflows: StdMutex::new(HashMap::new()),
            dynamic_nodes: StdMutex::new(HashMap::new()),
            handoff_depth: StdMutex::new(HashMap::new()),
            loop_state: StdMutex::new(HashMap::new()),
        }
    }

    /// Assemble the whole core from one loaded [`Config`].
    ///
    /// This is the composition root for hosts: the permission service is
    /// seeded from `config.permissions`, sessions take `config.session`,
    /// and the scheduler takes `config.workflow`.  The store, provider
    /// factory, and ECP transport stay host-supplied.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn StateStore>,
        factory: Arc<dyn ProviderFactory>,
        ecp: Arc<dyn EcpTransport>,
    ) -> Arc<Self> {
        let permissions = Arc::new(PermissionService::from_config(&config.permissions));
        let tools = Arc::new(ToolExecutor::new(ecp, translator_for("claude")));
        let agents = Arc::new(AgentRegistry::new());
        let sessions = Arc::new(SessionManager::new(
            factory,
            permissions,
            tools,
            Arc::clone(&agents),
            config.session.clone(),
        ));
        let panels = Arc::new(ReviewPanelService::new(Arc::clone(&store)));
        Arc::new(Self::new(store, sessions, agents, panels, config.workflow.clone()))
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    // ── Workflow registration ─────────────────────────────────────────────────

    pub fn register_workflow(&self, workflow: Workflow) -> Result<(), crate::step::ValidationError> {
        workflow.validate()?;
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id.clone(), workflow);
        Ok(())
    }

    pub fn workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.lock().unwrap().get(id).cloned()
    }

    // ── Execution lifecycle ───────────────────────────────────────────────────

    /// Create and start an execution of a registered workflow.
    pub async fn start_execution(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> anyhow::Result<Execution> {
        let workflow = self
            .workflow(workflow_id)
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {workflow_id}"))?;

        let mut execution = Execution::new(workflow_id, input.clone(), workflow.max_iterations);
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.store.create_execution(execution.clone()).await?;

        if let Some(text) = input.as_str() {
            self.record_user_input(&execution.id, text, 0).await?;
        }

        self.notifier.activity(&execution.id, None, "execution_started");
        Ok(execution)
    }

    /// Record a user message both as transcript and as prompt context.
    pub async fn record_user_input(
        &self,
        execution_id: &str,
        content: &str,
        iteration: u32,
    ) -> anyhow::Result<()> {
        self.store
            .create_message(ExecutionMessage::complete(
                execution_id,
                MessageRole::User,
                content,
            ))
            .await?;
        self.store
            .create_context_item(ContextItem::new(
                execution_id,
                ContextItemType::UserInput,
                content,
                iteration,
            ))
            .await?;
        Ok(())
    }

    /// Drive the execution until it pauses, completes, or fails.
    pub async fn run(&self, execution_id: &str) -> anyhow::Result<Execution> {
        loop {
            match self.execute_step(execution_id).await? {
                StepProgress::Ran { .. } => continue,
                StepProgress::Paused | StepProgress::Completed => break,
            }
        }
        Ok(self.store.get_execution(execution_id).await?)
    }

    /// One unit of scheduler progress: pick the next node and run it.
    pub async fn execute_step(&self, execution_id: &str) -> anyhow::Result<StepProgress> {
        let mut execution = self.store.get_execution(execution_id).await?;
        if execution.status != ExecutionStatus::Running {
            anyhow::bail!(
                "execution {execution_id} is not running (status {:?})",
                execution.status
            );
        }

        let workflow = self
            .workflow(&execution.workflow_id)
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {}", execution.workflow_id))?;

        if execution.iteration_count > execution.max_iterations {
            self.fail_execution(&mut execution, "maximum iterations exceeded")
                .await?;
            anyhow::bail!("maximum iterations exceeded");
        }

        let steps = self.all_steps(&workflow, execution_id);
        let node_execs = self.store.list_node_executions(execution_id).await?;
        let completed = status_set(&node_execs, execution.iteration_count, NodeExecutionStatus::Completed);
        let skipped = status_set(&node_execs, execution.iteration_count, NodeExecutionStatus::Skipped);

        // Explicit routing from decision/loop/handoff wins while the target
        // is still open in this iteration; a stale target falls back to
        // readiness resolution.
        let routed = match &execution.current_node_id {
            Some(current) if !completed.contains(current.as_str()) => {
                steps.iter().find(|s| &s.id == current).cloned()
            }
            _ => None,
        };
        let step = routed.or_else(|| first_ready(&steps, &completed, &skipped));

        let Some(step) = step else {
            self.complete_execution(&mut execution).await?;
            return Ok(StepProgress::Completed);
        };

        let input = node_input(&execution, &step, &node_execs);
        let mut node = NodeExecution::new(
            execution_id,
            &step.id,
            step.step_type.as_str(),
            execution.iteration_count,
            input.clone(),
        );
        self.store.create_node_execution(node.clone()).await?;
        self.notifier.activity(execution_id, Some(&step.id), "node_started");

        let outcome = match self.dispatch(&execution, &step, input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(execution = execution_id, node = %step.id, error = %e, "node handler failed");
                node.status = NodeExecutionStatus::Failed;
                node.completed_at = Some(Utc::now());
                node.duration_ms =
                    Some((Utc::now() - node.started_at).num_milliseconds());
                let _ = self.store.update_node_execution(node).await;
                self.notifier.activity(execution_id, Some(&step.id), "node_failed");
                self.fail_execution(&mut execution, &e.to_string()).await?;
                return Err(e);
            }
        };

        // Record the node result.
        node.output = Some(outcome.output.clone());
        node.tokens_in = outcome.tokens_in;
        node.tokens_out = outcome.tokens_out;
        if !outcome.leave_node_running {
            node.status = NodeExecutionStatus::Completed;
            node.completed_at = Some(Utc::now());
            node.duration_ms = Some((Utc::now() - node.started_at).num_milliseconds());
        }
        if let Err(e) = self.store.update_node_execution(node).await {
            // A duplicate completion is an invariant breach, not a handler
            // error: abort the execution with a diagnostic.
            self.fail_execution(&mut execution, &e.to_string()).await?;
            return Err(e.into());
        }
        self.notifier.activity(execution_id, Some(&step.id), "node_completed");

        // Apply routing.
        if let Some(final_output) = outcome.final_output {
            execution.final_output = Some(final_output);
        }
        execution.current_node_id = outcome.next_node_id.clone();
        if outcome.increment_iteration {
            execution.iteration_count += 1;
            if execution.iteration_count > execution.max_iterations {
                self.fail_execution(&mut execution, "maximum iterations exceeded")
                    .await?;
                anyhow::bail!("maximum iterations exceeded");
            }
        }

        if outcome.complete_execution {
            self.complete_execution(&mut execution).await?;
            return Ok(StepProgress::Completed);
        }

        if let Some(status) = outcome.pause {
            execution.status = status;
            self.store.update_execution(execution).await?;
            return Ok(StepProgress::Paused);
        }

        self.store.update_execution(execution).await?;
        Ok(StepProgress::Ran { node_id: step.id })
    }

    // ── Parallel branches ─────────────────────────────────────────────────────

    /// Every node ready in the current iteration, in step order.
    pub async fn find_all_ready_nodes(&self, execution_id: &str) -> anyhow::Result<Vec<String>> {
        let execution = self.store.get_execution(execution_id).await?;
        let workflow = self
            .workflow(&execution.workflow_id)
            .context("unknown workflow")?;
        let steps = self.all_steps(&workflow, execution_id);
        let node_execs = self.store.list_node_executions(execution_id).await?;
        let completed = status_set(&node_execs, execution.iteration_count, NodeExecutionStatus::Completed);
        let skipped = status_set(&node_execs, execution.iteration_count, NodeExecutionStatus::Skipped);
        Ok(steps
            .iter()
            .filter(|s| is_ready(s, &completed, &skipped))
            .map(|s| s.id.clone())
            .collect())
    }

    /// Run several ready nodes concurrently (branches after a `split`).
    ///
    /// Node results are recorded as they finish; execution-level routing
    /// from the outcomes is ignored – parallel branches re-join through a
    /// merge node, not through `current_node_id`.
    pub async fn execute_parallel(
        &self,
        execution_id: &str,
        node_ids: &[String],
    ) -> anyhow::Result<()> {
        let execution = self.store.get_execution(execution_id).await?;
        if execution.status != ExecutionStatus::Running {
            anyhow::bail!("execution {execution_id} is not running");
        }
        let workflow = self
            .workflow(&execution.workflow_id)
            .context("unknown workflow")?;
        let steps = self.all_steps(&workflow, execution_id);
        let node_execs = self.store.list_node_executions(execution_id).await?;

        let tasks = node_ids.iter().map(|node_id| {
            let step = steps.iter().find(|s| &s.id == node_id).cloned();
            let execution = execution.clone();
            let input = step
                .as_ref()
                .map(|s| node_input(&execution, s, &node_execs))
                .unwrap_or(Value::Null);
            async move {
                let step = step
                    .ok_or_else(|| anyhow::anyhow!("unknown node: {node_id}"))?;
                let mut node = NodeExecution::new(
                    &execution.id,
                    &step.id,
                    step.step_type.as_str(),
                    execution.iteration_count,
                    input.clone(),
                );
                self.store.create_node_execution(node.clone()).await?;
                self.notifier.activity(&execution.id, Some(&step.id), "node_started");
                let outcome = self.dispatch(&execution, &step, input).await?;
                node.output = Some(outcome.output);
                node.tokens_in = outcome.tokens_in;
                node.tokens_out = outcome.tokens_out;
                node.status = NodeExecutionStatus::Completed;
                node.completed_at = Some(Utc::now());
                node.duration_ms = Some((Utc::now() - node.started_at).num_milliseconds());
                self.store.update_node_execution(node).await?;
                self.notifier.activity(&execution.id, Some(&step.id), "node_completed");
                anyhow::Ok(())
            }
        });
        futures::future::try_join_all(tasks).await?;
        Ok(())
    }

    // ── Resumption ────────────────────────────────────────────────────────────

    /// Resume after an `await_input` pause: new iteration, back to the
    /// first step.
    pub async fn resume_after_input(&self, execution_id: &str) -> anyhow::Result<Execution> {
        let mut execution = self.store.get_execution(execution_id).await?;
        if execution.status != ExecutionStatus::AwaitingInput {
            anyhow::bail!("execution {execution_id} is not awaiting input");
        }
        let workflow = self
            .workflow(&execution.workflow_id)
            .context("unknown workflow")?;

        execution.iteration_count += 1;
        if execution.iteration_count > execution.max_iterations {
            self.fail_execution(&mut execution, "maximum iterations exceeded")
                .await?;
            anyhow::bail!("maximum iterations exceeded");
        }
        execution.current_node_id = workflow.steps.first().map(|s| s.id.clone());
        execution.status = ExecutionStatus::Running;
        self.store.update_execution(execution.clone()).await?;
        self.notifier.activity(execution_id, None, "resumed");
        Ok(execution)
    }

    /// Resolve a checkpoint and resume the execution.
    ///
    /// The checkpoint's node execution is completed with the decision as
    /// output, so readiness moves past it on the next step.
    pub async fn resume_after_checkpoint(
        &self,
        execution_id: &str,
        checkpoint_id: &str,
        decision: &str,
        feedback: Option<&str>,
    ) -> anyhow::Result<Execution> {
        let mut execution = self.store.get_execution(execution_id).await?;
        if execution.status != ExecutionStatus::AwaitingInput {
            anyhow::bail!("execution {execution_id} is not awaiting input");
        }

        let mut checkpoint = self.store.get_checkpoint(checkpoint_id).await?;
        checkpoint.decision = Some(decision.to_string());
        checkpoint.feedback = feedback.map(str::to_string);
        self.store.update_checkpoint(checkpoint.clone()).await?;

        // Close the checkpoint's node execution.
        let node_execs = self.store.list_node_executions(execution_id).await?;
        if let Some(mut node) = node_execs
            .into_iter()
            .find(|n| n.id == checkpoint.node_execution_id)
        {
            node.status = NodeExecutionStatus::Completed;
            node.output = Some(json!({ "decision": decision, "feedback": feedback }));
            node.completed_at = Some(Utc::now());
            node.duration_ms = Some((Utc::now() - node.started_at).num_milliseconds());
            self.store.update_node_execution(node).await?;
        }

        execution.status = ExecutionStatus::Running;
        self.store.update_execution(execution.clone()).await?;
        self.notifier.activity(execution_id, None, "resumed");
        Ok(execution)
    }

    /// Cancel an execution; in-flight node handlers observe the status on
    /// return and do not advance state.
    pub async fn cancel_execution(&self, execution_id: &str) -> anyhow::Result<()> {
        let mut execution = self.store.get_execution(execution_id).await?;
        if execution.status.is_terminal() {
            return Ok(());
        }
        execution.status = ExecutionStatus::Cancelled;
        execution.completed_at = Some(Utc::now());
        self.store.update_execution(execution).await?;
        self.cleanup(execution_id);
        self.notifier.activity(execution_id, None, "execution_cancelled");
        Ok(())
    }

    /// Delete an execution and every descendant record.
    pub async fn delete_execution(&self, execution_id: &str) -> anyhow::Result<()> {
        self.cleanup(execution_id);
        self.store.delete_execution(execution_id).await?;
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────────────────────

    /// Static steps plus the execution's dynamic handoff nodes.
    pub(crate) fn all_steps(&self, workflow: &Workflow, execution_id: &str) -> Vec<WorkflowStep> {
        let mut steps = workflow.steps.clone();
        if let Some(dynamic) = self.dynamic_nodes.lock().unwrap().get(execution_id) {
            steps.extend(dynamic.iter().cloned());
        }
        steps
    }

    async fn complete_execution(&self, execution: &mut Execution) -> anyhow::Result<()> {
        execution.status = ExecutionStatus::Completed;
        execution.completed_at = Some(Utc::now());
        if execution.final_output.is_none() {
            // Fall back to the newest agent output so callers always see a
            // result even without an explicit output node.
            let items = self.store.list_context_items(&execution.id).await?;
            execution.final_output = items
                .iter()
                .rev()
                .find(|i| i.item_type == ContextItemType::AgentOutput)
                .map(|i| Value::String(i.content.clone()));
        }
        self.store.update_execution(execution.clone()).await?;
        self.cleanup(&execution.id);
        self.notifier.activity(&execution.id, None, "execution_completed");
        debug!(execution = %execution.id, "execution completed");
        Ok(())
    }

    pub(crate) async fn fail_execution(
        &self,
        execution: &mut Execution,
        message: &str,
    ) -> anyhow::Result<()> {
        execution.status = ExecutionStatus::Failed;
        execution.error_message = Some(message.to_string());
        execution.completed_at = Some(Utc::now());
        self.store.update_execution(execution.clone()).await?;
        self.cleanup(&execution.id);
        self.notifier.activity(&execution.id, None, "execution_failed");
        Ok(())
    }

    /// Drop per-execution side state on terminal transitions.
    fn cleanup(&self, execution_id: &str) {
        self.dynamic_nodes.lock().unwrap().remove(execution_id);
        self.handoff_depth.lock().unwrap().remove(execution_id);
        self.loop_state
            .lock()
            .unwrap()
            .retain(|(exec, _), _| exec != execution_id);
    }

    async fn dispatch(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        match step.step_type {
            StepType::Agent => self.handle_agent(execution, step, input).await,
            StepType::Trigger | StepType::Router | StepType::Transform | StepType::PermissionGate => {
                Ok(NodeOutcome { output: input, ..Default::default() })
            }
            StepType::Checkpoint | StepType::Human => {
                self.handle_checkpoint(execution, step).await
            }
            StepType::Decision | StepType::Vote => self.handle_decision(execution, step).await,
            StepType::AwaitInput => self.handle_await_input(execution, step).await,
            StepType::ReviewPanel => self.handle_review_panel(execution, step, input).await,
            StepType::Split => self.handle_split(execution, step, input),
            StepType::Merge => self.handle_merge(execution, step).await,
            StepType::Loop => self.handle_loop(execution, step, input),
            StepType::Condition => self.handle_condition(execution, step, input).await,
            StepType::Output => self.handle_output(execution, step, input).await,
        }
    }
}

// ── Scheduling helpers ────────────────────────────────────────────────────────

fn status_set<'a>(
    node_execs: &'a [NodeExecution],
    iteration: u32,
    status: NodeExecutionStatus,
) -> HashSet<&'a str> {
    node_execs
        .iter()
        .filter(|n| n.iteration_number == iteration && n.status == status)
        .map(|n| n.node_id.as_str())
        .collect()
}

fn is_ready(step: &WorkflowStep, completed: &HashSet<&str>, skipped: &HashSet<&str>) -> bool {
    if completed.contains(step.id.as_str()) || skipped.contains(step.id.as_str()) {
        return false;
    }
    if step.depends.is_empty() {
        return true;
    }
    match (step.step_type, step.merge_strategy.unwrap_or_default()) {
        (StepType::Merge, MergeStrategy::WaitAny) => step
            .depends
            .iter()
            .any(|d| completed.contains(d.as_str())),
        _ => step
            .depends
            .iter()
            .all(|d| completed.contains(d.as_str())),
    }
}

fn first_ready(
    steps: &[WorkflowStep],
    completed: &HashSet<&str>,
    skipped: &HashSet<&str>,
) -> Option<WorkflowStep> {
    steps.iter().find(|s| is_ready(s, completed, skipped)).cloned()
}

/// Input for a node: the initial input for roots, otherwise the outputs of
/// its completed dependencies (a single dep's output is passed bare).
fn node_input(
    execution: &Execution,
    step: &WorkflowStep,
    node_execs: &[NodeExecution],
) -> Value {
    if step.depends.is_empty() {
        return execution.initial_input.clone();
    }
    let mut outputs: Vec<(&str, Value)> = Vec::new();
    for dep in &step.depends {
        if let Some(n) = node_execs.iter().rev().find(|n| {
            n.node_id == *dep
                && n.iteration_number == execution.iteration_count
                && n.status == NodeExecutionStatus::Completed
        }) {
            outputs.push((dep, n.output.clone().unwrap_or(Value::Null)));
        }
    }
    match outputs.len() {
        0 => execution.initial_input.clone(),
        1 => outputs.remove(0).1,
        _ => Value::Object(
            outputs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod scheduling_tests {
    use super::*;
    use crate::step::StepType;

    fn completed<'a>(ids: &[&'a str]) -> HashSet<&'a str> {
        ids.iter().copied().collect()
    }

    #[test]
    fn root_step_is_ready_when_nothing_completed() {
        let step = WorkflowStep::agent("a", "assistant");
        assert!(is_ready(&step, &completed(&[]), &completed(&[])));
    }

    #[test]
    fn completed_step_is_not_ready_again() {
        let step = WorkflowStep::agent("a", "assistant");
        assert!(!is_ready(&step, &completed(&["a"]), &completed(&[])));
    }

    #[test]
    fn skipped_step_is_not_ready() {
        let step = WorkflowStep::agent("a", "assistant");
        assert!(!is_ready(&step, &completed(&[]), &completed(&["a"])));
    }

    #[test]
    fn step_waits_for_all_dependencies() {
        let step = WorkflowStep::agent("c", "assistant").with_depends(&["a", "b"]);
        assert!(!is_ready(&step, &completed(&["a"]), &completed(&[])));
        assert!(is_ready(&step, &completed(&["a", "b"]), &completed(&[])));
    }

    #[test]
    fn wait_any_merge_is_ready_with_one_dependency() {
        let mut step = WorkflowStep::new("m", StepType::Merge).with_depends(&["a", "b"]);
        step.merge_strategy = Some(MergeStrategy::WaitAny);
        assert!(is_ready(&step, &completed(&["a"]), &completed(&[])));
        assert!(!is_ready(&step, &completed(&[]), &completed(&[])));
    }

    #[test]
    fn wait_all_merge_needs_every_dependency() {
        let step = WorkflowStep::new("m", StepType::Merge).with_depends(&["a", "b"]);
        assert!(!is_ready(&step, &completed(&["a"]), &completed(&[])));
        assert!(is_ready(&step, &completed(&["a", "b"]), &completed(&[])));
    }

    #[test]
    fn first_ready_respects_step_order() {
        let steps = vec![
            WorkflowStep::agent("a", "assistant"),
            WorkflowStep::agent("b", "assistant"),
        ];
        let next = first_ready(&steps, &completed(&[]), &completed(&[])).unwrap();
        assert_eq!(next.id, "a");
    }
}
