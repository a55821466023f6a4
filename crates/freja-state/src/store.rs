// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::records::*;

/// Persistence failures surfaced to the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("node {node_id} already completed in iteration {iteration}")]
    AlreadyCompleted { node_id: String, iteration: u32 },
    #[error("storage error: {0}")]
    Storage(String),
}

/// The narrow persistence boundary.
///
/// The production engine is an embedded relational store owned by the host;
/// the core only requires these operations, each of which is one
/// transaction.  [`crate::MemoryStore`] is the in-process implementation
/// used by tests and ephemeral sessions.
#[async_trait]
pub trait StateStore: Send + Sync {
    // ── Executions ────────────────────────────────────────────────────────────

    async fn create_execution(&self, execution: Execution) -> Result<(), StateError>;
    async fn get_execution(&self, id: &str) -> Result<Execution, StateError>;
    async fn update_execution(&self, execution: Execution) -> Result<(), StateError>;
    /// Cascade-deletes every descendant record.
    async fn delete_execution(&self, id: &str) -> Result<(), StateError>;
    async fn list_executions(&self) -> Result<Vec<Execution>, StateError>;

    // ── Node executions ───────────────────────────────────────────────────────

    async fn create_node_execution(&self, node: NodeExecution) -> Result<(), StateError>;
    /// Enforces the at-most-one-completed-per-(node, iteration) invariant:
    /// marking a second record `Completed` for the same pair is rejected.
    async fn update_node_execution(&self, node: NodeExecution) -> Result<(), StateError>;
    async fn list_node_executions(&self, execution_id: &str)
        -> Result<Vec<NodeExecution>, StateError>;
    /// Node ids completed in the given iteration, in completion order.
    async fn completed_nodes_in_iteration(
        &self,
        execution_id: &str,
        iteration: u32,
    ) -> Result<Vec<String>, StateError>;

    // ── Messages ──────────────────────────────────────────────────────────────

    async fn create_message(&self, message: ExecutionMessage) -> Result<(), StateError>;
    async fn update_message(&self, message: ExecutionMessage) -> Result<(), StateError>;
    /// Canonical transcript order: `created_at` ascending.
    async fn list_messages(&self, execution_id: &str)
        -> Result<Vec<ExecutionMessage>, StateError>;

    // ── Context items ─────────────────────────────────────────────────────────

    async fn create_context_item(&self, item: ContextItem) -> Result<(), StateError>;
    async fn update_context_item(&self, item: ContextItem) -> Result<(), StateError>;
    async fn list_context_items(&self, execution_id: &str)
        -> Result<Vec<ContextItem>, StateError>;
    async fn active_context_items(&self, execution_id: &str)
        -> Result<Vec<ContextItem>, StateError>;

    // ── Checkpoints ───────────────────────────────────────────────────────────

    async fn create_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StateError>;
    async fn update_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), StateError>;
    async fn get_checkpoint(&self, id: &str) -> Result<Checkpoint, StateError>;
    /// Checkpoints with no decision yet, blocking their execution.
    async fn pending_checkpoints(&self, execution_id: &str)
        -> Result<Vec<Checkpoint>, StateError>;

    // ── Feedback queue ────────────────────────────────────────────────────────

    async fn create_feedback(&self, item: FeedbackQueueItem) -> Result<(), StateError>;
    async fn update_feedback(&self, item: FeedbackQueueItem) -> Result<(), StateError>;
    async fn list_feedback(&self, execution_id: &str)
        -> Result<Vec<FeedbackQueueItem>, StateError>;

    // ── Tool calls ────────────────────────────────────────────────────────────

    async fn record_tool_call(&self, record: ToolCallRecord) -> Result<(), StateError>;
    async fn list_tool_calls(&self, execution_id: &str)
        -> Result<Vec<ToolCallRecord>, StateError>;

    // ── Review panels ─────────────────────────────────────────────────────────

    async fn create_panel(&self, panel: ReviewPanelRecord) -> Result<(), StateError>;
    async fn update_panel(&self, panel: ReviewPanelRecord) -> Result<(), StateError>;
    async fn get_panel(&self, id: &str) -> Result<ReviewPanelRecord, StateError>;
}
