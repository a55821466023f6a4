// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent node handler: session streaming with per-iteration chat
//! messages, and dynamic handoff nodes.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use freja_model::MessageContent;
use freja_panel::{ReviewerRunner, ReviewerSpec};
use freja_session::{build_context, BuilderMessage, Compaction, SessionEvent, SessionManager, SessionOptions};
use freja_state::{
    ContextItem, ContextItemType, Execution, ExecutionMessage, MessageRole, NodeExecutionStatus,
};
use freja_tools::{Caller, ToolExecution, ToolHandler, ToolUse};

use crate::executor::{NodeOutcome, WorkflowExecutor, DELEGATE_TOOL};
use crate::notify::WorkflowNotification;
use crate::step::{Workflow, WorkflowStep};

/// Hidden-tool handler for `DelegateToAgent`.
///
/// Only acknowledges: the loop needs a tool_result to continue, while the
/// actual dynamic-node injection is done by the agent handler after the
/// send completes, from the recorded tool uses.
pub(crate) struct DelegateAck;

#[async_trait]
impl ToolHandler for DelegateAck {
    async fn handle(&self, tool_use: &ToolUse, _caller: &Caller) -> ToolExecution {
        ToolExecution::ok(json!({
            "status": "delegation requested",
            "agentId": tool_use.input.get("agentId").cloned().unwrap_or(Value::Null),
        }))
    }
}

/// Runs panel reviewers through their own sessions on this execution.
pub(crate) struct SessionReviewerRunner {
    sessions: Arc<SessionManager>,
    chat_id: String,
    options: SessionOptions,
}

impl SessionReviewerRunner {
    pub(crate) fn new(executor: &WorkflowExecutor, execution: &Execution) -> Self {
        Self {
            sessions: Arc::clone(&executor.sessions),
            chat_id: execution.id.clone(),
            options: SessionOptions {
                working_dir: execution.working_dir.clone(),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl ReviewerRunner for SessionReviewerRunner {
    async fn run_reviewer(
        &self,
        reviewer: &ReviewerSpec,
        question: &str,
    ) -> anyhow::Result<String> {
        let prompt = format!(
            "{question}\n\nEnd your review with exactly these lines:\n\
             VOTE: critical | request_changes | approve\n\
             FEEDBACK: <one paragraph>\n\
             Optionally: ISSUES: <json array of {{\"severity\", \"description\", \"file\"}}>"
        );
        let (tx, mut rx) = mpsc::channel(64);
        // Drain events so a chatty reviewer can never fill the channel and
        // wedge its own send.
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let outcome = self
            .sessions
            .send(&self.chat_id, &reviewer.agent_id, &self.options, &prompt, tx)
            .await;
        let _ = drain.await;
        Ok(outcome?.text)
    }
}

/// True when the workflow engages more than one distinct agent.
fn is_multi_agent(workflow: &Workflow) -> bool {
    let agents: HashSet<&str> = workflow
        .steps
        .iter()
        .filter_map(|s| s.agent.as_deref())
        .collect();
    agents.len() > 1
}

impl WorkflowExecutor {
    /// Run an agent step: resolve the agent, compose its user message from
    /// context, stream the session, persist per-iteration chat messages,
    /// and process handoff requests.
    pub(crate) async fn handle_agent(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        input: Value,
    ) -> anyhow::Result<NodeOutcome> {
        let workflow = self
            .workflow(&execution.workflow_id)
            .ok_or_else(|| anyhow::anyhow!("unknown workflow: {}", execution.workflow_id))?;

        // Agent resolution: step → workflow default → configured default.
        let mut agent_id = step
            .agent
            .clone()
            .or_else(|| workflow.default_agent_id.clone())
            .unwrap_or_else(|| self.config.default_agent.clone());
        if self.agents.get(&agent_id).is_none() {
            warn!(agent = %agent_id, "agent not found; falling back to assistant");
            agent_id = "assistant".to_string();
        }
        let agent = self
            .agents
            .get(&agent_id)
            .ok_or_else(|| anyhow::anyhow!("unknown agent: {agent_id}"))?;

        let message = self
            .compose_agent_message(execution, step, &agent, &input)
            .await?;

        let options = SessionOptions {
            working_dir: execution.working_dir.clone(),
            allowed_tools: step
                .allowed_tools
                .clone()
                .or_else(|| workflow.default_allowed_tools.clone()),
            denied_tools: step.denied_tools.clone(),
            multi_agent: is_multi_agent(&workflow),
            ..Default::default()
        };

        let node_execution_id = self
            .store
            .list_node_executions(&execution.id)
            .await?
            .iter()
            .rev()
            .find(|n| n.node_id == step.id && n.status == NodeExecutionStatus::Running)
            .map(|n| n.id.clone());

        let history_before = self.sessions.history(&execution.id, &agent_id).await.len();

        // Stream the session; persist one chat message per tool-use
        // iteration so the UI can show thinking rounds distinctly.
        let (tx, mut rx) = mpsc::channel::<SessionEvent>(256);
        let sessions = Arc::clone(&self.sessions);
        let send_chat = execution.id.clone();
        let send_agent = agent_id.clone();
        let send_options = options.clone();
        let send_message = message.clone();
        let send_task = tokio::spawn(async move {
            sessions
                .send(&send_chat, &send_agent, &send_options, &send_message, tx)
                .await
        });

        let mut current = ExecutionMessage::streaming(
            &execution.id,
            MessageRole::Agent,
            Some(agent_id.clone()),
            node_execution_id.clone(),
        );
        self.store.create_message(current.clone()).await?;
        self.notifier.emit(WorkflowNotification::MessageStarted {
            execution_id: execution.id.clone(),
            message_id: current.id.clone(),
            agent_id: Some(agent_id.clone()),
            timestamp: Utc::now(),
        });

        let mut buffer = String::new();
        // Tool inputs arrive on the start event; the audit row is written
        // once the matching result lands.
        let mut tool_inputs: std::collections::HashMap<String, Value> =
            std::collections::HashMap::new();
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::MessageDelta(delta) => {
                    buffer.push_str(&delta);
                    current.content = buffer.clone();
                    self.store.update_message(current.clone()).await?;
                    self.notifier.emit(WorkflowNotification::MessageDelta {
                        execution_id: execution.id.clone(),
                        message_id: current.id.clone(),
                        delta,
                        timestamp: Utc::now(),
                    });
                }
                SessionEvent::IterationComplete { has_tool_use: true, .. } => {
                    current.content = std::mem::take(&mut buffer);
                    current.is_complete = true;
                    current.is_tool_use_iteration = true;
                    self.store.update_message(current.clone()).await?;
                    self.notifier.emit(WorkflowNotification::MessageCompleted {
                        execution_id: execution.id.clone(),
                        message_id: current.id.clone(),
                        is_final: false,
                        timestamp: Utc::now(),
                    });

                    current = ExecutionMessage::streaming(
                        &execution.id,
                        MessageRole::Agent,
                        Some(agent_id.clone()),
                        node_execution_id.clone(),
                    );
                    self.store.create_message(current.clone()).await?;
                    self.notifier.emit(WorkflowNotification::MessageStarted {
                        execution_id: execution.id.clone(),
                        message_id: current.id.clone(),
                        agent_id: Some(agent_id.clone()),
                        timestamp: Utc::now(),
                    });
                }
                SessionEvent::ToolUseStarted { tool_use_id, input, .. } => {
                    tool_inputs.insert(tool_use_id, input);
                }
                SessionEvent::ToolUseResult { tool_use_id, tool_name, content, is_error } => {
                    let mut record = freja_state::ToolCallRecord::new(
                        &execution.id,
                        &tool_name,
                        tool_inputs.remove(&tool_use_id).unwrap_or(Value::Null),
                    );
                    record.node_execution_id = node_execution_id.clone();
                    record.result = Some(Value::String(content));
                    record.success = !is_error;
                    self.store.record_tool_call(record).await?;

                    self.notifier.emit(WorkflowNotification::MessageToolUse {
                        execution_id: execution.id.clone(),
                        message_id: current.id.clone(),
                        tool_name,
                        is_error,
                        timestamp: Utc::now(),
                    });
                }
                SessionEvent::LoopComplete(final_text) => {
                    current.content = if final_text.is_empty() {
                        std::mem::take(&mut buffer)
                    } else {
                        final_text
                    };
                    current.is_complete = true;
                    current.is_final_iteration = true;
                    self.store.update_message(current.clone()).await?;
                    self.notifier.emit(WorkflowNotification::MessageCompleted {
                        execution_id: execution.id.clone(),
                        message_id: current.id.clone(),
                        is_final: true,
                        timestamp: Utc::now(),
                    });
                }
                SessionEvent::Error(e) => {
                    warn!(execution = %execution.id, node = %step.id, "session error: {e}");
                }
                _ => {}
            }
        }

        let outcome = send_task
            .await
            .map_err(|e| anyhow::anyhow!("agent send task panicked: {e}"))??;

        // Only the final iteration's content feeds downstream agents; the
        // tool-use rounds stay in the chat transcript.
        self.store
            .create_context_item(
                ContextItem::new(
                    &execution.id,
                    ContextItemType::AgentOutput,
                    &outcome.text,
                    execution.iteration_count,
                )
                .with_agent(&agent_id),
            )
            .await?;

        let next_node_id = self
            .process_handoffs(execution, step, &agent_id, history_before)
            .await?;

        Ok(NodeOutcome {
            output: Value::String(outcome.text),
            next_node_id,
            tokens_in: outcome.tokens_in,
            tokens_out: outcome.tokens_out,
            ..Default::default()
        })
    }

    /// Compose the user message for an agent step.
    ///
    /// Tail: the step prompt, plus the latest user input for roots or the
    /// dependency outputs otherwise.  Head of the message: context from
    /// earlier iterations – other agents' outputs, system summaries, and
    /// compaction summaries – assembled through the window builder so a
    /// long-running execution stays inside the model's budget.
    async fn compose_agent_message(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        agent: &freja_agents::AgentDef,
        input: &Value,
    ) -> anyhow::Result<String> {
        let items = self.store.active_context_items(&execution.id).await?;

        let mut parts: Vec<String> = Vec::new();
        if let Some(prompt) = &step.prompt {
            parts.push(prompt.clone());
        }

        if step.depends.is_empty() {
            // Roots see the newest user turn (conversation loops replace
            // the initial input on every resume).
            let latest_input = items
                .iter()
                .rev()
                .find(|i| i.item_type == ContextItemType::UserInput)
                .map(|i| i.content.clone())
                .or_else(|| execution.initial_input.as_str().map(str::to_string));
            if let Some(text) = latest_input {
                parts.push(text);
            }
        } else {
            match input {
                Value::String(s) if !s.is_empty() => parts.push(s.clone()),
                Value::Object(map) => {
                    for (source, value) in map {
                        let text = match value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        parts.push(format!("## Output from {source}\n{text}"));
                    }
                }
                _ => {}
            }
        }

        if parts.is_empty() {
            parts.push("Continue.".to_string());
        }
        let tail = parts.join("\n\n");

        let context = self
            .earlier_iteration_context(execution, agent, &items)
            .await?;
        if context.is_empty() {
            Ok(tail)
        } else {
            Ok(format!("## Context from earlier iterations\n\n{context}\n\n{tail}"))
        }
    }

    /// Budgeted context from iterations before the current one.
    ///
    /// The agent's own prior turns live in its session history already, so
    /// only other agents' outputs, system summaries, and applied compaction
    /// summaries are offered – trimmed oldest-first by the window builder.
    async fn earlier_iteration_context(
        &self,
        execution: &Execution,
        agent: &freja_agents::AgentDef,
        active_items: &[freja_state::ContextItem],
    ) -> anyhow::Result<String> {
        let relevant = |i: &&freja_state::ContextItem| -> bool {
            if i.iteration_number >= execution.iteration_count {
                return false;
            }
            match i.item_type {
                ContextItemType::System => true,
                ContextItemType::AgentOutput => i.agent_id.as_deref() != Some(agent.id.as_str()),
                _ => false,
            }
        };

        let actives: Vec<BuilderMessage> = active_items
            .iter()
            .filter(relevant)
            .map(|i| BuilderMessage {
                id: i.id.clone(),
                role: match i.item_type {
                    ContextItemType::AgentOutput => "assistant".to_string(),
                    _ => "system".to_string(),
                },
                content: match (&i.item_type, &i.agent_id) {
                    (ContextItemType::AgentOutput, Some(author)) => {
                        format!("[{author}] {}", i.content)
                    }
                    _ => i.content.clone(),
                },
                timestamp: i.created_at,
            })
            .collect();

        // Compaction summaries replace spans of deactivated items; the full
        // item list is needed to find each summary's start message.
        let all_items = self.store.list_context_items(&execution.id).await?;
        let compactions: Vec<Compaction> = active_items
            .iter()
            .filter(|i| i.item_type == ContextItemType::Compaction)
            .map(|summary| Compaction {
                id: summary.id.clone(),
                content: summary.content.clone(),
                start_message_id: all_items
                    .iter()
                    .find(|i| i.compacted_into_id.as_deref() == Some(summary.id.as_str()))
                    .map(|i| i.id.clone())
                    .unwrap_or_default(),
                timestamp: summary.created_at,
            })
            .collect();

        if actives.is_empty() && compactions.is_empty() {
            return Ok(String::new());
        }

        let window =
            freja_model::catalog::context_window_or(&agent.model, 128_000);
        let built = build_context(&agent.system_prompt, &actives, &compactions, window, None);

        Ok(built
            .messages
            .iter()
            .skip(1) // the system prompt is supplied by the session
            .filter_map(|m| m.as_text())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Turn `DelegateToAgent` tool uses from the just-finished send into
    /// dynamic workflow nodes.  Returns the first injected node id.
    async fn process_handoffs(
        &self,
        execution: &Execution,
        step: &WorkflowStep,
        agent_id: &str,
        history_before: usize,
    ) -> anyhow::Result<Option<String>> {
        let history = self.sessions.history(&execution.id, agent_id).await;
        let requests: Vec<Value> = history[history_before.min(history.len())..]
            .iter()
            .filter_map(|m| match &m.content {
                MessageContent::ToolUse { name, input, .. } if name == DELEGATE_TOOL => {
                    Some(input.clone())
                }
                _ => None,
            })
            .collect();

        let mut next_node = None;
        for request in requests {
            {
                let mut depths = self.handoff_depth.lock().unwrap();
                let depth = depths.entry(execution.id.clone()).or_insert(0);
                if *depth >= self.config.max_handoff_depth {
                    warn!(
                        execution = %execution.id,
                        depth = *depth,
                        "handoff depth limit reached; ignoring delegation"
                    );
                    continue;
                }
                *depth += 1;
            }

            let Some(target) = request.get("agentId").and_then(|v| v.as_str()) else {
                warn!("delegation request without agentId ignored");
                continue;
            };
            if self.agents.get(target).is_none() {
                warn!(target, "delegation to unknown agent ignored");
                continue;
            }

            let dynamic_id = format!(
                "handoff-{}-{}-{}",
                execution.id,
                Utc::now().timestamp_millis(),
                target
            );
            let mut dynamic = WorkflowStep::agent(&dynamic_id, target);
            dynamic.prompt = request
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            dynamic.depends = vec![step.id.clone()];
            self.dynamic_nodes
                .lock()
                .unwrap()
                .entry(execution.id.clone())
                .or_default()
                .push(dynamic);
            debug!(execution = %execution.id, node = %dynamic_id, target, "handoff node injected");

            if let Some(context) = request.get("context").and_then(|v| v.as_str()) {
                self.store
                    .create_context_item(
                        ContextItem::new(
                            &execution.id,
                            ContextItemType::System,
                            format!("Handoff context for {target}: {context}"),
                            execution.iteration_count,
                        )
                        .with_agent(agent_id),
                    )
                    .await?;
            }

            if next_node.is_none() {
                next_node = Some(dynamic_id);
            }
        }
        Ok(next_node)
    }
}
