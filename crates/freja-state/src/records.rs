// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Persistent record types for workflow executions.
//!
//! Every entity references its neighbours by string id, never by pointer –
//! records live in the persistence layer and in-memory caches are opt-in.
//! An [`Execution`] owns all descendant records; deleting it cascades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ─── Execution ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    AwaitingInput,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal states accept no further scheduling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Runtime instance of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    /// Explicit routing target for the next `execute_step` call, set by
    /// decision/loop/handoff handlers.  `None` means readiness-resolved.
    pub current_node_id: Option<String>,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub initial_input: Value,
    pub final_output: Option<Value>,
    pub error_message: Option<String>,
    /// Working directory injected into terminal tool calls.
    pub working_dir: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(workflow_id: impl Into<String>, initial_input: Value, max_iterations: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Pending,
            current_node_id: None,
            iteration_count: 0,
            max_iterations,
            initial_input,
            final_output: None,
            error_message: None,
            working_dir: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

// ─── Node execution ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One attempt to run a single step in a single iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: String,
    pub execution_id: String,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeExecutionStatus,
    pub iteration_number: u32,
    pub input: Value,
    pub output: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl NodeExecution {
    pub fn new(
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        node_type: impl Into<String>,
        iteration_number: u32,
        input: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            node_id: node_id.into(),
            node_type: node_type.into(),
            status: NodeExecutionStatus::Running,
            iteration_number,
            input,
            output: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            tokens_in: 0,
            tokens_out: 0,
        }
    }
}

// ─── Chat transcript ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Agent,
    System,
}

/// Chat-visible record used for UI display.
///
/// Streaming messages start with empty content and `is_complete = false`;
/// a writer that never completes one leaves it orphaned (the UI shows it as
/// interrupted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMessage {
    pub id: String,
    pub execution_id: String,
    pub role: MessageRole,
    pub agent_id: Option<String>,
    pub content: String,
    pub node_execution_id: Option<String>,
    pub is_complete: bool,
    /// Marks an intermediate thinking/tool-use round of an agent call.
    pub is_tool_use_iteration: bool,
    /// Marks the final round of an agent call.
    pub is_final_iteration: bool,
    pub created_at: DateTime<Utc>,
}

impl ExecutionMessage {
    pub fn streaming(
        execution_id: impl Into<String>,
        role: MessageRole,
        agent_id: Option<String>,
        node_execution_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            role,
            agent_id,
            content: String::new(),
            node_execution_id,
            is_complete: false,
            is_tool_use_iteration: false,
            is_final_iteration: false,
            created_at: Utc::now(),
        }
    }

    pub fn complete(
        execution_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            role,
            agent_id: None,
            content: content.into(),
            node_execution_id: None,
            is_complete: true,
            is_tool_use_iteration: false,
            is_final_iteration: false,
            created_at: Utc::now(),
        }
    }
}

// ─── Context items ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextItemType {
    UserInput,
    AgentOutput,
    System,
    ToolCall,
    ToolResult,
    Feedback,
    Compaction,
}

/// Prompt-building record.
///
/// Invariant: `compacted_into_id` set ⇒ `is_active` false; the compaction
/// summary item that replaced it must itself be active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: String,
    pub execution_id: String,
    pub item_type: ContextItemType,
    pub content: String,
    pub agent_id: Option<String>,
    pub iteration_number: u32,
    pub is_active: bool,
    pub compacted_into_id: Option<String>,
    pub tokens: Option<u32>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl ContextItem {
    pub fn new(
        execution_id: impl Into<String>,
        item_type: ContextItemType,
        content: impl Into<String>,
        iteration_number: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            item_type,
            content: content.into(),
            agent_id: None,
            iteration_number,
            is_active: true,
            compacted_into_id: None,
            tokens: None,
            is_complete: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

// ─── Checkpoints ──────────────────────────────────────────────────────────────

/// A pending human decision.  `decision = None` blocks its execution in
/// `awaiting_input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub execution_id: String,
    pub node_execution_id: String,
    pub checkpoint_type: String,
    pub prompt_message: String,
    pub options: Vec<String>,
    pub decision: Option<String>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        execution_id: impl Into<String>,
        node_execution_id: impl Into<String>,
        checkpoint_type: impl Into<String>,
        prompt_message: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            node_execution_id: node_execution_id.into(),
            checkpoint_type: checkpoint_type.into(),
            prompt_message: prompt_message.into(),
            options,
            decision: None,
            feedback: None,
            created_at: Utc::now(),
        }
    }
}

// ─── Feedback queue ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Queued,
    PendingReview,
    Addressed,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceTrigger {
    Immediate,
    IterationEnd,
    TaskComplete,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackQueueItem {
    pub id: String,
    pub execution_id: String,
    pub context_item_id: String,
    pub status: FeedbackStatus,
    pub priority: i32,
    pub surface_trigger: SurfaceTrigger,
    pub created_at: DateTime<Utc>,
}

impl FeedbackQueueItem {
    pub fn new(
        execution_id: impl Into<String>,
        context_item_id: impl Into<String>,
        priority: i32,
        surface_trigger: SurfaceTrigger,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            context_item_id: context_item_id.into(),
            status: FeedbackStatus::Queued,
            priority,
            surface_trigger,
            created_at: Utc::now(),
        }
    }
}

// ─── Tool call audit ──────────────────────────────────────────────────────────

/// Audit row recorded for every tool invocation routed through the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub execution_id: String,
    pub node_execution_id: Option<String>,
    pub tool_name: String,
    pub arguments: Value,
    pub result: Option<Value>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl ToolCallRecord {
    pub fn new(
        execution_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            node_execution_id: None,
            tool_name: tool_name.into(),
            arguments,
            result: None,
            success: false,
            created_at: Utc::now(),
        }
    }
}

// ─── Review panels ────────────────────────────────────────────────────────────

/// Persisted panel run.  The config is stored opaquely – the panel service
/// owns its typed schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPanelRecord {
    pub id: String,
    pub execution_id: String,
    pub node_execution_id: String,
    pub config: Value,
    pub status: String,
    pub votes: Vec<VoteRecord>,
    pub outcome: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub reviewer_id: String,
    pub vote: String,
    pub feedback: String,
    pub issues: Vec<Value>,
    pub weight: u32,
}

impl ReviewPanelRecord {
    pub fn new(
        execution_id: impl Into<String>,
        node_execution_id: impl Into<String>,
        config: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            node_execution_id: node_execution_id.into(),
            config,
            status: "running".into(),
            votes: Vec::new(),
            outcome: None,
            summary: None,
            created_at: Utc::now(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
