// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::records::*;
use crate::store::{StateError, StateStore};

#[derive(Default)]
struct Tables {
    executions: HashMap<String, Execution>,
    node_executions: Vec<NodeExecution>,
    messages: Vec<ExecutionMessage>,
    context_items: Vec<ContextItem>,
    checkpoints: Vec<Checkpoint>,
    feedback: Vec<FeedbackQueueItem>,
    tool_calls: Vec<ToolCallRecord>,
    panels: HashMap<String, ReviewPanelRecord>,
}

/// In-process [`StateStore`] used by tests and ephemeral sessions.
///
/// Rows are kept in insertion order, which is `created_at` ascending for a
/// single process – the transcript-ordering guarantee falls out of that.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &'static str, id: &str) -> StateError {
    StateError::NotFound { kind, id: id.to_string() }
}

#[async_trait]
impl StateStore for MemoryStore {
    // ── Executions ────────────────────────────────────────────────────────────

    async fn create_execution(&self, execution: Execution) -> Result<(), StateError> {
        self.tables
            .lock()
            .unwrap()
            .executions
            .insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Execution, StateError> {
        self.tables
            .lock()
            .unwrap()
            .executions
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("execution", id))
    }

    async fn update_execution(&self, execution: Execution) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        if !t.executions.contains_key(&execution.id) {
            return Err(not_found("execution", &execution.id));
        }
        t.executions.insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn delete_execution(&self, id: &str) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        t.executions
            .remove(id)
            .ok_or_else(|| not_found("execution", id))?;
        t.node_executions.retain(|n| n.execution_id != id);
        t.messages.retain(|m| m.execution_id != id);
        t.context_items.retain(|c| c.execution_id != id);
        t.checkpoints.retain(|c| c.execution_id != id);
        t.feedback.retain(|f| f.execution_id != id);
        t.tool_calls.retain(|c| c.execution_id != id);
        t.panels.retain(|_, p| p.execution_id != id);
        Ok(())
    }

    async fn list_executions(&self) -> Result<Vec<Execution>, StateError> {
        let mut all: Vec<Execution> =
            self.tables.lock().unwrap().executions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    // ── Node executions ───────────────────────────────────────────────────────

    async fn create_node_execution(&self, node: NodeExecution) -> Result<(), StateError> {
        self.tables.lock().unwrap().node_executions.push(node);
        Ok(())
    }

    async fn update_node_execution(&self, node: NodeExecution) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        if node.status == NodeExecutionStatus::Completed {
            let duplicate = t.node_executions.iter().any(|n| {
                n.id != node.id
                    && n.execution_id == node.execution_id
                    && n.node_id == node.node_id
                    && n.iteration_number == node.iteration_number
                    && n.status == NodeExecutionStatus::Completed
            });
            if duplicate {
                return Err(StateError::AlreadyCompleted {
                    node_id: node.node_id,
                    iteration: node.iteration_number,
                });
            }
        }
        let slot = t
            .node_executions
            .iter_mut()
            .find(|n| n.id == node.id)
            .ok_or_else(|| not_found("node_execution", &node.id))?;
        *slot = node;
        Ok(())
    }

    async fn list_node_executions(
        &self,
        execution_id: &str,
    ) -> Result<Vec<NodeExecution>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .node_executions
            .iter()
            .filter(|n| n.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn completed_nodes_in_iteration(
        &self,
        execution_id: &str,
        iteration: u32,
    ) -> Result<Vec<String>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .node_executions
            .iter()
            .filter(|n| {
                n.execution_id == execution_id
                    && n.iteration_number == iteration
                    && n.status == NodeExecutionStatus::Completed
            })
            .map(|n| n.node_id.clone())
            .collect())
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    async fn create_message(&self, message: ExecutionMessage) -> Result<(), StateError> {
        self.tables.lock().unwrap().messages.push(message);
        Ok(())
    }

    async fn update_message(&self, message: ExecutionMessage) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        let slot = t
            .messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| not_found("message", &message.id))?;
        *slot = message;
        Ok(())
    }

    async fn list_messages(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ExecutionMessage>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.execution_id == execution_id)
            .cloned()
            .collect())
    }

    // ── Context items ─────────────────────────────────────────────────────────

    async fn create_context_item(&self, item: ContextItem) -> Result<(), StateError> {
        self.tables.lock().unwrap().context_items.push(item);
        Ok(())
    }

    async fn update_context_item(&self, item: ContextItem) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        let slot = t
            .context_items
            .iter_mut()
            .find(|c| c.id == item.id)
            .ok_or_else(|| not_found("context_item", &item.id))?;
        *slot = item;
        Ok(())
    }

    async fn list_context_items(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ContextItem>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .context_items
            .iter()
            .filter(|c| c.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn active_context_items(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ContextItem>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .context_items
            .iter()
            .filter(|c| c.execution_id == execution_id && c.is_active)
            .cloned()
            .collect())
    }

    // ── Checkpoints ───────────────────────────────────────────────────────────

    async fn create_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StateError> {
        self.tables.lock().unwrap().checkpoints.push(checkpoint);
        Ok(())
    }

    async fn update_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        let slot = t
            .checkpoints
            .iter_mut()
            .find(|c| c.id == checkpoint.id)
            .ok_or_else(|| not_found("checkpoint", &checkpoint.id))?;
        *slot = checkpoint;
        Ok(())
    }

    async fn get_checkpoint(&self, id: &str) -> Result<Checkpoint, StateError> {
        self.tables
            .lock()
            .unwrap()
            .checkpoints
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found("checkpoint", id))
    }

    async fn pending_checkpoints(
        &self,
        execution_id: &str,
    ) -> Result<Vec<Checkpoint>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .checkpoints
            .iter()
            .filter(|c| c.execution_id == execution_id && c.decision.is_none())
            .cloned()
            .collect())
    }

    // ── Feedback queue ────────────────────────────────────────────────────────

    async fn create_feedback(&self, item: FeedbackQueueItem) -> Result<(), StateError> {
        self.tables.lock().unwrap().feedback.push(item);
        Ok(())
    }

    async fn update_feedback(&self, item: FeedbackQueueItem) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        let slot = t
            .feedback
            .iter_mut()
            .find(|f| f.id == item.id)
            .ok_or_else(|| not_found("feedback", &item.id))?;
        *slot = item;
        Ok(())
    }

    async fn list_feedback(
        &self,
        execution_id: &str,
    ) -> Result<Vec<FeedbackQueueItem>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .feedback
            .iter()
            .filter(|f| f.execution_id == execution_id)
            .cloned()
            .collect())
    }

    // ── Tool calls ────────────────────────────────────────────────────────────

    async fn record_tool_call(&self, record: ToolCallRecord) -> Result<(), StateError> {
        self.tables.lock().unwrap().tool_calls.push(record);
        Ok(())
    }

    async fn list_tool_calls(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ToolCallRecord>, StateError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .tool_calls
            .iter()
            .filter(|c| c.execution_id == execution_id)
            .cloned()
            .collect())
    }

    // ── Review panels ─────────────────────────────────────────────────────────

    async fn create_panel(&self, panel: ReviewPanelRecord) -> Result<(), StateError> {
        self.tables
            .lock()
            .unwrap()
            .panels
            .insert(panel.id.clone(), panel);
        Ok(())
    }

    async fn update_panel(&self, panel: ReviewPanelRecord) -> Result<(), StateError> {
        let mut t = self.tables.lock().unwrap();
        if !t.panels.contains_key(&panel.id) {
            return Err(not_found("panel", &panel.id));
        }
        t.panels.insert(panel.id.clone(), panel);
        Ok(())
    }

    async fn get_panel(&self, id: &str) -> Result<ReviewPanelRecord, StateError> {
        self.tables
            .lock()
            .unwrap()
            .panels
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("panel", id))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
