// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use freja_permissions::{PendingRequest, Scope};

/// Events emitted by a session's send-and-stream loop.
/// Consumers (workflow agent handler, UI bridge) subscribe through the
/// `mpsc` sender passed to `send`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A new tool-use iteration begins (emitted from iteration 2 onward).
    IterationStart {
        iteration: u32,
        /// Assistant text accumulated in the previous iteration.
        previous_content: String,
    },
    /// One provider turn finished; `has_tool_use` tells whether the loop
    /// continues.
    IterationComplete {
        iteration: u32,
        has_tool_use: bool,
    },
    /// A tool call passed the permission gate and is about to execute.
    ToolUseStarted {
        tool_use_id: String,
        tool_name: String,
        input: Value,
        auto_approved: bool,
        approval_scope: Option<Scope>,
    },
    /// A tool call finished (or was denied).
    ToolUseResult {
        tool_use_id: String,
        tool_name: String,
        content: String,
        is_error: bool,
    },
    /// A tool call is blocked on a human decision.
    ToolUseRequest(PendingRequest),
    /// A streamed text chunk.
    MessageDelta(String),
    /// Full assistant text of the turn that just ended.
    MessageEnd(String),
    /// The send loop is done; carries the final response text.
    LoopComplete(String),
    /// A recoverable error; the loop has already folded it into history.
    Error(String),
}
