// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

/// Outbound observability notifications.
///
/// Mirrors what the host UI subscribes to: execution/node lifecycle,
/// streaming message activity, and panel progress.  Every variant carries
/// the owning execution id and a timestamp.
#[derive(Debug, Clone)]
pub enum WorkflowNotification {
    /// Execution or node lifecycle (`workflow/activity`).
    Activity {
        execution_id: String,
        node_id: Option<String>,
        phase: String,
        timestamp: DateTime<Utc>,
    },
    MessageStarted {
        execution_id: String,
        message_id: String,
        agent_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    MessageDelta {
        execution_id: String,
        message_id: String,
        delta: String,
        timestamp: DateTime<Utc>,
    },
    MessageCompleted {
        execution_id: String,
        message_id: String,
        is_final: bool,
        timestamp: DateTime<Utc>,
    },
    MessageToolUse {
        execution_id: String,
        message_id: String,
        tool_name: String,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },
    AwaitingInput {
        execution_id: String,
        prompt: String,
        timestamp: DateTime<Utc>,
    },
    SplitStarted {
        execution_id: String,
        node_id: String,
        timestamp: DateTime<Utc>,
    },
    MergeCompleted {
        execution_id: String,
        node_id: String,
        output: Value,
        timestamp: DateTime<Utc>,
    },
    Output {
        execution_id: String,
        output: Value,
        timestamp: DateTime<Utc>,
    },
    ReviewPanelStarted {
        execution_id: String,
        node_id: String,
        reviewer_count: usize,
        timestamp: DateTime<Utc>,
    },
    ReviewPanelVote {
        execution_id: String,
        node_id: String,
        reviewer_id: String,
        vote: String,
        timestamp: DateTime<Utc>,
    },
    ReviewPanelCompleted {
        execution_id: String,
        node_id: String,
        outcome: String,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowNotification {
    pub fn execution_id(&self) -> &str {
        match self {
            Self::Activity { execution_id, .. }
            | Self::MessageStarted { execution_id, .. }
            | Self::MessageDelta { execution_id, .. }
            | Self::MessageCompleted { execution_id, .. }
            | Self::MessageToolUse { execution_id, .. }
            | Self::AwaitingInput { execution_id, .. }
            | Self::SplitStarted { execution_id, .. }
            | Self::MergeCompleted { execution_id, .. }
            | Self::Output { execution_id, .. }
            | Self::ReviewPanelStarted { execution_id, .. }
            | Self::ReviewPanelVote { execution_id, .. }
            | Self::ReviewPanelCompleted { execution_id, .. } => execution_id,
        }
    }
}

/// Broadcast fan-out to however many observers are attached.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<WorkflowNotification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowNotification> {
        self.tx.subscribe()
    }

    pub fn emit(&self, notification: WorkflowNotification) {
        // No subscribers is normal in headless runs.
        if let Err(e) = self.tx.send(notification) {
            debug!("workflow notification dropped: {e}");
        }
    }

    pub fn activity(&self, execution_id: &str, node_id: Option<&str>, phase: &str) {
        self.emit(WorkflowNotification::Activity {
            execution_id: execution_id.to_string(),
            node_id: node_id.map(str::to_string),
            phase: phase.to_string(),
            timestamp: Utc::now(),
        });
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
