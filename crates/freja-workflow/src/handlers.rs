// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Node handlers for everything except agent nodes (see `agent_node`).

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use freja_panel::{OutcomeAction, PanelOutcome};
use freja_state::{
    Checkpoint, ContextItem, ContextItemType, Execution, ExecutionMessage, ExecutionStatus,
    FeedbackQueueItem, MessageRole, NodeExecution, NodeExecutionStatus, SurfaceTrigger,
};

use crate::agent_node::SessionReviewerRunner;
use crate::executor::{NodeOutcome, WorkflowExecutor};
use crate::notify::WorkflowNotification;
use crate::step::{LoopType, MergeStrategy, StepType, Workflow, WorkflowStep};

/// Loose truthiness used by condition nodes and `while` loops.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// One loop visit: `(output, done)` for the given zero-based visit index.
fn loop_progress(step: &WorkflowStep, input: &Value, index: u32) -> (Value, bool) {
    let cap = step.loop_max_iterations.unwrap_or(100);
    let loop_type = step.loop_type.unwrap_or(LoopType::Times);

    let continue_output = |item: Option<Value>| {
        let mut out = json!({ "continue": true, "currentIndex": index });
        if let Some(item) = item {
            out["currentItem"] = item;
        }
        out
    };

    match loop_type {
        LoopType::ForEach => {
            let field = step.loop_array_field.as_deref().unwrap_or("items");
            let items = input
                .get(field)
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let limit = (items.len() as u32).min(cap);
            if index < limit {
                (continue_output(Some(items[index as usize].clone())), false)
            } else {
                (json!({ "done": true }), true)
            }
        }
        LoopType::Times => {
            let limit = step.loop_times.unwrap_or(1).min(cap);
            if index < limit {
                (continue_output(None), false)
            } else {
                (json!({ "done": true }), true)
            }
        }
        LoopType::While => {
            if truthy(input) && index < cap {
                (continue_output(None), false)
            } else {
                (json!({ "done": true }), true)
            }
        }
    }
}

/// First root agent step – the decision/panel "loop back to the coder"
/// target.
fn first_root_agent(workflow: &Workflow) -> Option<String> {
    workflow
        .steps
        .iter()
        .find(|s| s.is_root() && s.step_type == StepType::Agent)
        .map(|s| s.id.clone())
}

fn find_step_of_type(workflow: &Workflow, wanted: &[StepType]) -> Option<String> {
    workflow
        .steps
        .iter()
        .find(|s| wanted.contains(&s.step_type))
        .map(|s| s.id.clone())
}

impl WorkflowExecutor {
    // ── Checkpoint ────────────────────────────────────────────────────────────

    /// Open a checkpoint and park the execution until a human decides.
    ///
    /// The node execution stays `Running`; `resume_after_checkpoint`
    /// completes it, which lets readiness move past this node.
    pub(crate) async fn handle_checkpoint(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
    ) -> anyhow::Result<NodeOutcome> {
        let node_execs = self.store.list_node_executions(&execution.id).await?;
        let node_execution_id = node_execs
            .iter()
            .rev()
            .find(|n| n.node_id == step.id && n.status == NodeExecutionStatus::Running)
            .map(|n| n.id.clone())
            .unwrap_or_default();

        let prompt = step
            .prompt
            .clone()
            .or_else(|| step.review_question.clone())
            .unwrap_or_else(|| "Approve the work so far to continue.".to_string());

        let checkpoint = Checkpoint::new(
            &execution.id,
            node_execution_id,
            "approval",
            &prompt,
            vec!["approve".into(), "reject".into()],
        );
        self.store.create_checkpoint(checkpoint).await?;

        self.notifier.emit(WorkflowNotification::AwaitingInput {
            execution_id: execution.id.clone(),
            prompt,
            timestamp: Utc::now(),
        });

        Ok(NodeOutcome {
            output: json!({ "checkpoint": true }),
            next_node_id: Some(step.id.clone()),
            pause: Some(ExecutionStatus::AwaitingInput),
            leave_node_running: true,
            ..Default::default()
        })
    }

    // ── Decision / vote ───────────────────────────────────────────────────────

    /// Tally `VOTE:` markers from this iteration's agent outputs and route.
    pub(crate) async fn handle_decision(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
    ) -> anyhow::Result<NodeOutcome> {
        let workflow = self
            .workflow(&execution.workflow_id)
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {}", execution.workflow_id))?;

        let vote_re = Regex::new(r"(?i)VOTE:\s*(critical|queue|approve)").expect("static regex");
        let items = self.store.active_context_items(&execution.id).await?;
        let votes: Vec<String> = items
            .iter()
            .filter(|i| {
                i.item_type == ContextItemType::AgentOutput
                    && i.iteration_number == execution.iteration_count
            })
            .filter_map(|i| vote_re.captures(&i.content))
            .map(|c| c[1].to_lowercase())
            .collect();

        let total = votes.len();
        let critical = votes.iter().filter(|v| *v == "critical").count();
        let queue = votes.iter().filter(|v| *v == "queue").count();

        let (decision, outcome) = if total > 0 && critical == total {
            // Every reviewer flagged critical: hand it to the arbiter.
            let checkpoint =
                find_step_of_type(&workflow, &[StepType::Checkpoint, StepType::Human]);
            let outcome = match checkpoint {
                Some(target) => NodeOutcome {
                    output: json!({ "decision": "escalate" }),
                    next_node_id: Some(target),
                    ..Default::default()
                },
                None => NodeOutcome {
                    output: json!({ "decision": "escalate" }),
                    pause: Some(ExecutionStatus::Paused),
                    ..Default::default()
                },
            };
            ("escalate", outcome)
        } else if total > 0 && critical * 2 >= total {
            (
                "address_critical",
                NodeOutcome {
                    output: json!({ "decision": "address_critical" }),
                    next_node_id: first_root_agent(&workflow),
                    increment_iteration: true,
                    ..Default::default()
                },
            )
        } else if queue > 0 {
            let item = ContextItem::new(
                &execution.id,
                ContextItemType::Feedback,
                format!("{queue} reviewer(s) queued non-blocking change requests."),
                execution.iteration_count,
            );
            self.store.create_context_item(item.clone()).await?;
            self.store
                .create_feedback(FeedbackQueueItem::new(
                    &execution.id,
                    &item.id,
                    1,
                    SurfaceTrigger::IterationEnd,
                ))
                .await?;

            let feedback_node = workflow
                .steps
                .iter()
                .find(|s| s.id.contains("feedback"))
                .map(|s| s.id.clone());
            match feedback_node {
                Some(target) => (
                    "queue_feedback",
                    NodeOutcome {
                        output: json!({ "decision": "queue_feedback" }),
                        next_node_id: Some(target),
                        ..Default::default()
                    },
                ),
                // No feedback lane configured: the queue votes were
                // non-blocking, so the work stands approved.
                None => (
                    "approve",
                    NodeOutcome {
                        output: json!({ "decision": "approve" }),
                        complete_execution: true,
                        ..Default::default()
                    },
                ),
            }
        } else {
            (
                "approve",
                NodeOutcome {
                    output: json!({ "decision": "approve" }),
                    complete_execution: true,
                    ..Default::default()
                },
            )
        };

        let summary = format!(
            "Decision: {decision} – {total} vote(s), {critical} critical, {queue} queue."
        );
        debug!(execution = %execution.id, node = %step.id, "{summary}");
        self.store
            .create_message(ExecutionMessage::complete(
                &execution.id,
                MessageRole::System,
                &summary,
            ))
            .await?;

        Ok(outcome)
    }

    // ── Await input ───────────────────────────────────────────────────────────

    /// Park the execution for the next user turn (conversation loops).
    pub(crate) async fn handle_await_input(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
    ) -> anyhow::Result<NodeOutcome> {
        let prompt = step
            .prompt
            .clone()
            .unwrap_or_else(|| "Waiting for your input.".to_string());
        self.store
            .create_message(ExecutionMessage::complete(
                &execution.id,
                MessageRole::System,
                &prompt,
            ))
            .await?;
        self.notifier.emit(WorkflowNotification::AwaitingInput {
            execution_id: execution.id.clone(),
            prompt,
            timestamp: Utc::now(),
        });
        Ok(NodeOutcome {
            output: json!({ "awaiting_input": true }),
            next_node_id: None,
            pause: Some(ExecutionStatus::AwaitingInput),
            ..Default::default()
        })
    }

    // ── Review panel ──────────────────────────────────────────────────────────

    pub(crate) async fn handle_review_panel(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        _input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        let workflow = self
            .workflow(&execution.workflow_id)
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {}", execution.workflow_id))?;
        let config = step
            .review_panel
            .clone()
            .ok_or_else(|| anyhow::anyhow!("review_panel node {} has no panel config", step.id))?;

        // The panel reviews this iteration's agent outputs.
        let items = self.store.active_context_items(&execution.id).await?;
        let mut question = step
            .review_question
            .clone()
            .or_else(|| step.prompt.clone())
            .unwrap_or_else(|| "Review the work below.".to_string());
        for item in items.iter().filter(|i| {
            i.item_type == ContextItemType::AgentOutput
                && i.iteration_number == execution.iteration_count
        }) {
            let author = item.agent_id.as_deref().unwrap_or("agent");
            question.push_str(&format!("\n\n## Output from {author}\n{}", item.content));
        }

        let node_execs = self.store.list_node_executions(&execution.id).await?;
        let node_execution_id = node_execs
            .iter()
            .rev()
            .find(|n| n.node_id == step.id && n.status == NodeExecutionStatus::Running)
            .map(|n| n.id.clone())
            .unwrap_or_default();

        self.notifier.emit(WorkflowNotification::ReviewPanelStarted {
            execution_id: execution.id.clone(),
            node_id: step.id.clone(),
            reviewer_count: config.reviewers.len(),
            timestamp: Utc::now(),
        });

        let runner = SessionReviewerRunner::new(self, execution);
        let (record, outcome, summary) = self
            .panels
            .run_panel(
                &execution.id,
                &node_execution_id,
                &config,
                &question,
                std::sync::Arc::new(runner),
            )
            .await?;

        for vote in &record.votes {
            self.notifier.emit(WorkflowNotification::ReviewPanelVote {
                execution_id: execution.id.clone(),
                node_id: step.id.clone(),
                reviewer_id: vote.reviewer_id.clone(),
                vote: vote.vote.clone(),
                timestamp: Utc::now(),
            });
        }
        self.notifier.emit(WorkflowNotification::ReviewPanelCompleted {
            execution_id: execution.id.clone(),
            node_id: step.id.clone(),
            outcome: outcome.as_str().to_string(),
            timestamp: Utc::now(),
        });

        let rendered = summary.render(outcome);
        self.store
            .create_message(ExecutionMessage::complete(
                &execution.id,
                MessageRole::System,
                &rendered,
            ))
            .await?;
        self.store
            .create_context_item(ContextItem::new(
                &execution.id,
                ContextItemType::System,
                &rendered,
                execution.iteration_count,
            ))
            .await?;

        // Non-blocking change requests land in the feedback queue and
        // surface at iteration end rather than interrupting the flow.
        if outcome == PanelOutcome::QueueChanges {
            for issue in summary.other_issues.iter() {
                let item = ContextItem::new(
                    &execution.id,
                    ContextItemType::Feedback,
                    &issue.description,
                    execution.iteration_count,
                );
                self.store.create_context_item(item.clone()).await?;
                self.store
                    .create_feedback(FeedbackQueueItem::new(
                        &execution.id,
                        &item.id,
                        if issue.severity.eq_ignore_ascii_case("major") { 2 } else { 1 },
                        SurfaceTrigger::IterationEnd,
                    ))
                    .await?;
            }
        }

        let output = json!({
            "outcome": outcome.as_str(),
            "summary": rendered,
            "panel_id": record.id,
        });

        // Route per the configured outcome action, with scheduler defaults
        // for unconfigured outcomes.
        let outcome_route = config.outcomes.get(&outcome).cloned();
        let node_outcome = match outcome_route {
            Some(route) => match route.action {
                OutcomeAction::Loop => NodeOutcome {
                    output,
                    next_node_id: route.target.or_else(|| first_root_agent(&workflow)),
                    increment_iteration: true,
                    ..Default::default()
                },
                OutcomeAction::Continue => NodeOutcome {
                    output,
                    next_node_id: route.target,
                    ..Default::default()
                },
                OutcomeAction::Pause => NodeOutcome {
                    output,
                    pause: Some(ExecutionStatus::Paused),
                    ..Default::default()
                },
                OutcomeAction::Complete => NodeOutcome {
                    output,
                    complete_execution: true,
                    ..Default::default()
                },
            },
            None => match outcome {
                PanelOutcome::Approved => NodeOutcome {
                    output,
                    complete_execution: true,
                    ..Default::default()
                },
                PanelOutcome::AddressCritical => NodeOutcome {
                    output,
                    next_node_id: first_root_agent(&workflow),
                    increment_iteration: true,
                    ..Default::default()
                },
                PanelOutcome::QueueChanges => NodeOutcome { output, ..Default::default() },
                PanelOutcome::Escalate => {
                    match find_step_of_type(&workflow, &[StepType::Checkpoint, StepType::Human]) {
                        Some(target) => NodeOutcome {
                            output,
                            next_node_id: Some(target),
                            ..Default::default()
                        },
                        None => NodeOutcome {
                            output,
                            pause: Some(ExecutionStatus::Paused),
                            ..Default::default()
                        },
                    }
                }
            },
        };
        Ok(node_outcome)
    }

    // ── Split / merge ─────────────────────────────────────────────────────────

    pub(crate) fn handle_split(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        self.notifier.emit(WorkflowNotification::SplitStarted {
            execution_id: execution.id.clone(),
            node_id: step.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(NodeOutcome { output: input, ..Default::default() })
    }

    pub(crate) async fn handle_merge(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
    ) -> anyhow::Result<NodeOutcome> {
        let node_execs = self.store.list_node_executions(&execution.id).await?;
        let completed_dep = |dep: &str| -> Option<Value> {
            node_execs
                .iter()
                .rev()
                .find(|n| {
                    n.node_id == dep
                        && n.iteration_number == execution.iteration_count
                        && n.status == NodeExecutionStatus::Completed
                })
                .map(|n| n.output.clone().unwrap_or(Value::Null))
        };

        let strategy = step.merge_strategy.unwrap_or_default();
        let output = match strategy {
            MergeStrategy::WaitAll => {
                let mut merged = serde_json::Map::new();
                for dep in &step.depends {
                    let value = completed_dep(dep).ok_or_else(|| {
                        anyhow::anyhow!("merge {} ran before dependency {dep} completed", step.id)
                    })?;
                    merged.insert(dep.clone(), value);
                }
                Value::Object(merged)
            }
            MergeStrategy::WaitAny => step
                .depends
                .iter()
                .find_map(|dep| completed_dep(dep))
                .ok_or_else(|| {
                    anyhow::anyhow!("merge {} ran with no completed dependency", step.id)
                })?,
        };

        self.notifier.emit(WorkflowNotification::MergeCompleted {
            execution_id: execution.id.clone(),
            node_id: step.id.clone(),
            output: output.clone(),
            timestamp: Utc::now(),
        });
        Ok(NodeOutcome { output, ..Default::default() })
    }

    // ── Loop / condition ──────────────────────────────────────────────────────

    pub(crate) fn handle_loop(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        let index = {
            let mut state = self.loop_state.lock().unwrap();
            let counter = state
                .entry((execution.id.clone(), step.id.clone()))
                .or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };
        let (output, done) = loop_progress(step, &input, index);
        if done {
            self.loop_state
                .lock()
                .unwrap()
                .remove(&(execution.id.clone(), step.id.clone()));
        }
        Ok(NodeOutcome { output, ..Default::default() })
    }

    /// Branch on a loose truthiness of the input.  The branch not taken is
    /// recorded as `Skipped` so readiness never schedules it.
    pub(crate) async fn handle_condition(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        let workflow = self
            .workflow(&execution.workflow_id)
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {}", execution.workflow_id))?;
        let result = truthy(&input);

        let (taken, not_taken) = match &step.branches {
            Some(branches) => {
                let taken = if result { branches.on_true.clone() } else { branches.on_false.clone() };
                let other = if result { branches.on_false.clone() } else { branches.on_true.clone() };
                (taken, other)
            }
            None => {
                // Naming convention fallback: dependent ids containing
                // "true" / "false".
                let dependents = workflow.dependents(&step.id);
                let find = |needle: &str| {
                    dependents
                        .iter()
                        .find(|s| s.id.contains(needle))
                        .map(|s| s.id.clone())
                };
                let (t, f) = (find("true"), find("false"));
                if result {
                    (t, f)
                } else {
                    (f, t)
                }
            }
        };

        if let Some(skip_id) = not_taken {
            let mut skipped = NodeExecution::new(
                &execution.id,
                &skip_id,
                "skipped",
                execution.iteration_count,
                Value::Null,
            );
            skipped.status = NodeExecutionStatus::Skipped;
            skipped.completed_at = Some(Utc::now());
            self.store.create_node_execution(skipped).await?;
        }

        Ok(NodeOutcome {
            output: json!({ "result": result }),
            next_node_id: taken,
            ..Default::default()
        })
    }

    // ── Output ────────────────────────────────────────────────────────────────

    pub(crate) async fn handle_output(
        &self,
        execution: &Execution,
        _step: &WorkflowStep,
        input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        let content = match &input {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.store
            .create_context_item(ContextItem::new(
                &execution.id,
                ContextItemType::AgentOutput,
                &content,
                execution.iteration_count,
            ))
            .await?;
        self.notifier.emit(WorkflowNotification::Output {
            execution_id: execution.id.clone(),
            output: input.clone(),
            timestamp: Utc::now(),
        });
        Ok(NodeOutcome {
            output: input.clone(),
            next_node_id: None,
            final_output: Some(input),
            ..Default::default()
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
