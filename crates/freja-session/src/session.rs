// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use freja_agents::AgentDef;
use freja_model::{
    ChatRequest, Message, MessageContent, Provider, StopReason, StreamEvent, ToolSchema,
    ToolUseBlock, Usage,
};
use freja_permissions::{PendingRequest, PermissionDecision, PermissionService};
use freja_tools::{translate, Caller, ToolExecutor, ToolTranslator, ToolUse};

use crate::events::SessionEvent;

/// Lifecycle state of one session's streaming loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    WaitingForTool,
    AwaitingPermission,
    Cancelled,
}

/// Token usage accumulated over one `send` call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SendUsage {
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// One (chat × agent) conversation bound to a provider connection.
pub(crate) struct SessionInner {
    pub id: String,
    pub chat_id: String,
    pub agent: AgentDef,
    pub provider: Arc<dyn Provider>,
    pub translator: Arc<dyn ToolTranslator>,
    /// Provider-dialect tools offered on every request (already filtered by
    /// the agent's allow/deny lists).
    pub tools: Vec<ToolSchema>,
    pub system_prompt: String,
    pub working_dir: Option<String>,
    pub max_tokens: u32,
    pub max_tool_iterations: u32,
    pub state: StdMutex<SessionState>,
    pub history: tokio::sync::Mutex<Vec<Message>>,
    pub cli_session_id: StdMutex<Option<String>>,
}

/// Append a synthetic error `tool_result` after every `tool_use` that has
/// none, so the history satisfies the wire invariant "every tool_use is
/// followed by its tool_result" before the next provider call.
pub fn repair_orphans(history: &mut Vec<Message>) -> usize {
    let answered: Vec<String> = history
        .iter()
        .filter(|m| matches!(m.content, MessageContent::ToolResult { .. }))
        .filter_map(|m| m.tool_use_id().map(str::to_string))
        .collect();

    let mut repaired = 0;
    let mut index = 0;
    while index < history.len() {
        let orphan_id = match &history[index].content {
            MessageContent::ToolUse { tool_use_id, .. }
                if !answered.contains(tool_use_id) =>
            {
                Some(tool_use_id.clone())
            }
            _ => None,
        };
        if let Some(id) = orphan_id {
            warn!(tool_use_id = %id, "repairing orphaned tool use");
            history.insert(
                index + 1,
                Message::tool_error(id, "Operation cancelled by user"),
            );
            repaired += 1;
            index += 1; // skip the inserted result
        }
        index += 1;
    }
    repaired
}

/// Target-path heuristics over a tool input, for folder-scope checks.
pub(crate) fn extract_target_path(input: &Value) -> Option<String> {
    for key in ["file_path", "path", "filePath", "target_path", "targetPath", "cwd"] {
        if let Some(p) = input.get(key).and_then(|v| v.as_str()) {
            return Some(p.to_string());
        }
    }
    None
}

impl SessionInner {
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    fn is_cancelled(&self) -> bool {
        self.state() == SessionState::Cancelled
    }

    /// Abort the in-flight send, if any.
    ///
    /// The provider is asked to abort; the loop observes the state at its
    /// next checkpoint, repairs orphans, and settles back to `Idle`.  When
    /// no send is running the history lock is free and repair happens here.
    pub async fn cancel(&self) {
        debug!(session = %self.id, chat = %self.chat_id, "cancel requested");
        self.set_state(SessionState::Cancelled);
        self.provider.cancel().await;
        if let Ok(mut history) = self.history.try_lock() {
            repair_orphans(&mut history);
            self.set_state(SessionState::Idle);
        }
    }

    /// The permission-store spelling of a provider-dialect tool name.
    fn permission_name(&self, provider_name: &str) -> String {
        self.translator
            .canonical_name(provider_name)
            .and_then(translate::display_name)
            .unwrap_or(provider_name)
            .to_string()
    }

    /// Run the send-and-stream loop for one user message.
    ///
    /// Returns the final response text; events stream through `tx` as they
    /// happen.  Tool failures and permission denials are folded into the
    /// conversation, never propagated – only provider/transport breakage
    /// errors out, which the caller maps to a failed execution.
    pub async fn send(
        &self,
        permissions: &PermissionService,
        executor: &ToolExecutor,
        user_message: &str,
        tx: mpsc::Sender<SessionEvent>,
    ) -> anyhow::Result<(String, SendUsage)> {
        let mut history = self.history.lock().await;
        self.set_state(SessionState::Streaming);
        history.push(Message::user(user_message));

        let mut usage = SendUsage::default();
        let mut iteration: u32 = 0;
        let mut previous_content = String::new();
        let mut final_text = String::new();

        loop {
            iteration += 1;
            if self.is_cancelled() {
                repair_orphans(&mut history);
                break;
            }
            if iteration > self.max_tool_iterations {
                warn!(
                    session = %self.id,
                    max = self.max_tool_iterations,
                    "tool iteration budget exhausted; ending loop"
                );
                break;
            }

            // Wire invariant gate: runs before every provider call.
            repair_orphans(&mut history);

            if iteration >= 2 {
                let _ = tx
                    .send(SessionEvent::IterationStart {
                        iteration,
                        previous_content: std::mem::take(&mut previous_content),
                    })
                    .await;
            }

            if let Some(cli_id) = self.cli_session_id.lock().unwrap().clone() {
                self.provider.set_session_id(&cli_id);
            }

            let request = ChatRequest {
                messages: history.clone(),
                system_prompt: Some(self.system_prompt.clone()),
                tools: self.tools.clone(),
                max_tokens: self.max_tokens,
                temperature: None,
                cwd: self.working_dir.clone(),
            };

            let (text, tool_uses, stop_reason, turn_usage) =
                match self.stream_one_turn(request, &tx).await {
                    Ok(turn) => turn,
                    Err(e) => {
                        // Leave the session usable: wire-valid history, idle
                        // state.  The caller decides what the failure means.
                        repair_orphans(&mut history);
                        self.set_state(SessionState::Idle);
                        let _ = tx.send(SessionEvent::Error(e.to_string())).await;
                        return Err(e);
                    }
                };
            usage.tokens_in += turn_usage.input_tokens;
            usage.tokens_out += turn_usage.output_tokens;

            // Capture the provider-side session for resumption.
            if let Some(provider_session) = self.provider.session_id() {
                *self.cli_session_id.lock().unwrap() = Some(provider_session);
            }

            if !text.is_empty() {
                history.push(Message::assistant(&text));
                let _ = tx.send(SessionEvent::MessageEnd(text.clone())).await;
                previous_content = text.clone();
                final_text = text;
            }

            if stop_reason != StopReason::ToolUse {
                let _ = tx
                    .send(SessionEvent::IterationComplete { iteration, has_tool_use: false })
                    .await;
                break;
            }

            let _ = tx
                .send(SessionEvent::IterationComplete { iteration, has_tool_use: true })
                .await;

            for block in tool_uses {
                if self.is_cancelled() {
                    break;
                }
                self.run_tool_block(permissions, executor, &mut history, block, &tx)
                    .await;
            }
        }

        repair_orphans(&mut history);
        self.set_state(SessionState::Idle);
        let _ = tx.send(SessionEvent::LoopComplete(final_text.clone())).await;
        Ok((final_text, usage))
    }

    /// One provider turn: stream deltas out, collect text and tool uses.
    async fn stream_one_turn(
        &self,
        request: ChatRequest,
        tx: &mpsc::Sender<SessionEvent>,
    ) -> anyhow::Result<(String, Vec<ToolUseBlock>, StopReason, Usage)> {
        let mut stream = self
            .provider
            .chat_stream(request)
            .await
            .context("provider request failed")?;

        let mut text = String::new();
        let mut pending: Vec<(String, String, String)> = Vec::new(); // (id, name, json buf)
        let mut tool_uses: Vec<ToolUseBlock> = Vec::new();
        let mut stop_reason = StopReason::EndTurn;
        let mut usage = Usage::default();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta(delta) => {
                    text.push_str(&delta);
                    let _ = tx.send(SessionEvent::MessageDelta(delta)).await;
                }
                StreamEvent::ToolUseStart { id, name } => {
                    pending.push((id, name, String::new()));
                }
                StreamEvent::ToolUseInputDelta { id, partial_json } => {
                    if let Some((_, _, buf)) = pending.iter_mut().find(|(pid, _, _)| *pid == id) {
                        buf.push_str(&partial_json);
                    }
                }
                StreamEvent::ToolUseEnd { id } => {
                    if let Some(pos) = pending.iter().position(|(pid, _, _)| *pid == id) {
                        let (id, name, buf) = pending.remove(pos);
                        let input = if buf.is_empty() {
                            Value::Object(Default::default())
                        } else {
                            serde_json::from_str(&buf).unwrap_or_else(|e| {
                                warn!(tool_use_id = %id, error = %e, "invalid tool input JSON; substituting {{}}");
                                Value::Object(Default::default())
                            })
                        };
                        tool_uses.push(ToolUseBlock { id, name, input });
                    }
                }
                StreamEvent::MessageEnd { stop_reason: sr, usage: u } => {
                    stop_reason = sr;
                    usage = u;
                }
            }
        }

        // Flush unclosed blocks rather than dropping the call on the floor.
        for (id, name, buf) in pending {
            let input = serde_json::from_str(&buf)
                .unwrap_or_else(|_| Value::Object(Default::default()));
            warn!(tool_use_id = %id, "tool use block never closed; flushing");
            tool_uses.push(ToolUseBlock { id, name, input });
        }

        Ok((text, tool_uses, stop_reason, usage))
    }

    /// Gate one tool block through permissions, execute it, and fold the
    /// result into history.
    async fn run_tool_block(
        &self,
        permissions: &PermissionService,
        executor: &ToolExecutor,
        history: &mut Vec<Message>,
        block: ToolUseBlock,
        tx: &mpsc::Sender<SessionEvent>,
    ) {
        history.push(Message::tool_use(&block.id, &block.name, block.input.clone()));

        let permission_name = self.permission_name(&block.name);
        let target_path = extract_target_path(&block.input);

        // Workflow-internal tools never leave the process; they bypass the
        // store.  For everything else the lookup skips the global tier for
        // terminal tools, so a first Bash call always lands in the
        // pending-request flow.
        let check = if executor.has_hidden(&block.name) {
            Some(freja_permissions::CheckResult { allowed: true, approval: None, reason: None })
        } else {
            let result = permissions.check(&permission_name, &self.id, target_path.as_deref());
            result.allowed.then_some(result)
        };

        let (auto_approved, approval_scope) = match check {
            Some(result) => (true, result.approval.map(|a| a.scope)),
            None => {
                self.set_state(SessionState::AwaitingPermission);
                let request = PendingRequest::new(&block.id, &permission_name, &self.id)
                    .with_input(block.input.clone())
                    .with_target_path(target_path.clone());
                let rx = permissions.request(request.clone());
                let _ = tx.send(SessionEvent::ToolUseRequest(request)).await;

                let decision = rx.await.unwrap_or(PermissionDecision::Denied);
                self.set_state(SessionState::Streaming);
                match decision {
                    PermissionDecision::Approved { scope } => (false, Some(scope)),
                    PermissionDecision::Denied => {
                        debug!(tool = %block.name, "tool call denied by user");
                        history.push(Message::tool_error(&block.id, "User denied permission"));
                        let _ = tx
                            .send(SessionEvent::ToolUseResult {
                                tool_use_id: block.id.clone(),
                                tool_name: block.name.clone(),
                                content: "User denied permission".into(),
                                is_error: true,
                            })
                            .await;
                        return;
                    }
                }
            }
        };

        let _ = tx
            .send(SessionEvent::ToolUseStarted {
                tool_use_id: block.id.clone(),
                tool_name: block.name.clone(),
                input: block.input.clone(),
                auto_approved,
                approval_scope,
            })
            .await;

        self.set_state(SessionState::WaitingForTool);
        let tool_use = ToolUse {
            id: block.id.clone(),
            name: block.name.clone(),
            input: block.input.clone(),
        };
        let caller = Caller::Agent { agent_id: self.agent.id.clone() };
        let outcome = executor
            .execute_with(
                &tool_use,
                &caller,
                self.translator.as_ref(),
                self.working_dir.as_deref(),
            )
            .await;
        self.set_state(SessionState::Streaming);

        let content = outcome.content();
        if outcome.success {
            history.push(Message::tool_result(&block.id, &content));
        } else {
            history.push(Message::tool_error(&block.id, &content));
        }
        let _ = tx
            .send(SessionEvent::ToolUseResult {
                tool_use_id: block.id,
                tool_name: block.name,
                content,
                is_error: !outcome.success,
            })
            .await;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
