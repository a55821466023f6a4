// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

/// The content of a message.
///
/// - `Text` – plain text (most messages)
/// - `ToolUse` – the assistant requests a tool invocation
/// - `ToolResult` – the outcome of a tool call, possibly an error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolUse {
        tool_use_id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolUse {
                tool_use_id: id.into(),
                name: name.into(),
                input,
            },
        }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_use_id: id.into(),
                content: content.into(),
                is_error: false,
            },
        }
    }

    pub fn tool_error(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_use_id: id.into(),
                content: content.into(),
                is_error: true,
            },
        }
    }

    /// Return the plain text of this message, if it is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The `tool_use_id` referenced by this message, for either direction.
    pub fn tool_use_id(&self) -> Option<&str> {
        match &self.content {
            MessageContent::ToolUse { tool_use_id, .. }
            | MessageContent::ToolResult { tool_use_id, .. } => Some(tool_use_id),
            MessageContent::Text(_) => None,
        }
    }

    /// Approximate token count used for context budgeting.
    ///
    /// chars/4 heuristic, minimum 1.  Advisory only – providers count their
    /// own tokens for billing.
    pub fn approx_tokens(&self) -> usize {
        let chars = match &self.content {
            MessageContent::Text(t) => t.len(),
            MessageContent::ToolUse { name, input, .. } => name.len() + input.to_string().len(),
            MessageContent::ToolResult { content, .. } => content.len(),
        };
        chars.div_ceil(4).max(1)
    }
}

/// chars/4 token estimate for a raw string, matching [`Message::approx_tokens`].
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

// ─── Requests & responses ─────────────────────────────────────────────────────

/// A tool definition offered to the model, already in the provider's dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the input object
    pub input_schema: Value,
}

/// Request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolSchema>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Working directory hint for providers that execute tools host-side.
    pub cwd: Option<String>,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            tools: Vec::new(),
            max_tokens: 16_384,
            temperature: None,
            cwd: None,
        }
    }
}

/// Why the model stopped emitting output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other(String),
}

/// Token usage from one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A complete tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    /// Parsed JSON input object
    pub input: Value,
}

/// Final response assembled from one provider turn.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Accumulated text output (may be empty on pure tool-use turns).
    pub text: String,
    /// Tool invocations requested this turn, in emission order.
    pub tool_uses: Vec<ToolUseBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

/// A single streamed event from the model.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    ToolUseStart {
        id: String,
        name: String,
    },
    /// A chunk of the tool input JSON; chunks for one call arrive in order.
    ToolUseInputDelta {
        id: String,
        partial_json: String,
    },
    ToolUseEnd {
        id: String,
    },
    MessageEnd {
        stop_reason: StopReason,
        usage: Usage,
    },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ── Message construction ──────────────────────────────────────────────────

    #[test]
    fn user_message_sets_role_and_text() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
    }

    #[test]
    fn tool_use_message_carries_id_and_input() {
        let m = Message::tool_use("tu-1", "Read", json!({"file_path": "a.rs"}));
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.tool_use_id(), Some("tu-1"));
        assert!(m.as_text().is_none());
    }

    #[test]
    fn tool_error_sets_is_error() {
        let m = Message::tool_error("tu-1", "denied");
        match m.content {
            MessageContent::ToolResult { is_error, ref content, .. } => {
                assert!(is_error);
                assert_eq!(content, "denied");
            }
            _ => panic!("wrong content variant"),
        }
    }

    #[test]
    fn text_message_has_no_tool_use_id() {
        assert!(Message::assistant("hi").tool_use_id().is_none());
    }

    // ── Token approximation ───────────────────────────────────────────────────

    #[test]
    fn approx_tokens_rounds_up() {
        // 9 chars → ceil(9/4) = 3
        assert_eq!(Message::user("123456789").approx_tokens(), 3);
    }

    #[test]
    fn approx_tokens_minimum_is_one() {
        assert_eq!(Message::user("").approx_tokens(), 1);
    }

    #[test]
    fn estimate_tokens_matches_heuristic() {
        assert_eq!(estimate_tokens("12345678"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    // ── Serialisation ─────────────────────────────────────────────────────────

    #[test]
    fn message_round_trips_through_json() {
        let original = Message::tool_use("id-1", "Bash", json!({"command": "ls"}));
        let json = serde_json::to_string(&original).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_use_id(), Some("id-1"));
    }

    #[test]
    fn stop_reason_serializes_as_snake_case() {
        let s = serde_json::to_string(&StopReason::EndTurn).unwrap();
        assert_eq!(s, "\"end_turn\"");
        let s = serde_json::to_string(&StopReason::ToolUse).unwrap();
        assert_eq!(s, "\"tool_use\"");
    }

    #[test]
    fn default_request_uses_16k_output_budget() {
        assert_eq!(ChatRequest::default().max_tokens, 16_384);
    }
}
