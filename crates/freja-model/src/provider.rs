// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::types::{ChatRequest, ChatResponse, StopReason, StreamEvent, ToolUseBlock, Usage};

pub type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<StreamEvent>> + Send>>;

/// Static capabilities a provider reports about its current model.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub tool_use: bool,
    pub streaming: bool,
    pub vision: bool,
    pub system_messages: bool,
    pub max_context_tokens: usize,
    pub max_output_tokens: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            tool_use: true,
            streaming: true,
            vision: false,
            system_messages: true,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        }
    }
}

/// The narrow contract the core consumes from every AI provider.
///
/// Concrete HTTP/stream transports live outside the core; tests use the
/// scripted doubles in [`crate::mock`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider id (`"claude"`, `"openai"`, `"gemini"`, `"ollama"`, …).
    fn id(&self) -> &str;

    /// Model identifier forwarded to the provider API.
    fn model_name(&self) -> &str;

    /// Send a request and stream response events back.
    ///
    /// The stream must end with exactly one [`StreamEvent::MessageEnd`].
    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<EventStream>;

    /// Non-streaming convenience: folds [`chat_stream`](Self::chat_stream)
    /// into a final [`ChatResponse`].
    async fn chat(&self, req: ChatRequest) -> anyhow::Result<ChatResponse> {
        let stream = self.chat_stream(req).await?;
        collect_response(stream).await
    }

    /// Abort the in-flight request, if any.  Idempotent.
    async fn cancel(&self) {}

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn available_models(&self) -> anyhow::Result<Vec<String>> {
        Ok(crate::catalog::models_for_provider(self.id()))
    }

    /// Provider-side session id for transports that keep their own context
    /// (CLI-backed providers).  `None` for stateless transports.
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Resume a provider-side session on the next call.  No-op by default.
    fn set_session_id(&self, _id: &str) {}
}

/// Fold an event stream into a final [`ChatResponse`].
///
/// Tool input JSON arrives as deltas; each call's buffer is parsed at its
/// `ToolUseEnd`.  Unparseable input is substituted with `{}` – providers
/// (notably Anthropic-style) require the input to be an object, and a `null`
/// would poison the next request in the conversation.
pub async fn collect_response(mut stream: EventStream) -> anyhow::Result<ChatResponse> {
    let mut text = String::new();
    let mut tool_uses: Vec<ToolUseBlock> = Vec::new();
    let mut pending: HashMap<String, (String, String)> = HashMap::new(); // id → (name, json buffer)
    let mut order: Vec<String> = Vec::new();
    let mut stop_reason = StopReason::EndTurn;
    let mut usage = Usage::default();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => text.push_str(&delta),
            StreamEvent::ToolUseStart { id, name } => {
                order.push(id.clone());
                pending.insert(id, (name, String::new()));
            }
            StreamEvent::ToolUseInputDelta { id, partial_json } => {
                if let Some((_, buf)) = pending.get_mut(&id) {
                    buf.push_str(&partial_json);
                }
            }
            StreamEvent::ToolUseEnd { id } => {
                if let Some((name, buf)) = pending.remove(&id) {
                    let input = if buf.is_empty() {
                        serde_json::Value::Object(Default::default())
                    } else {
                        match serde_json::from_str(&buf) {
                            Ok(v) => v,
                            Err(e) => {
                                warn!(
                                    tool_name = %name,
                                    tool_use_id = %id,
                                    error = %e,
                                    "model sent tool use with invalid JSON input; substituting {{}}"
                                );
                                serde_json::Value::Object(Default::default())
                            }
                        }
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

    // A provider that never closed a tool-use block still gets its call
    // surfaced (with whatever input parsed) rather than silently dropped.
    for id in order {
        if let Some((name, buf)) = pending.remove(&id) {
            let input = serde_json::from_str(&buf)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
            warn!(tool_name = %name, tool_use_id = %id, "tool use block never closed; flushing");
            tool_uses.push(ToolUseBlock { id, name, input });
        }
    }

    Ok(ChatResponse { text, tool_uses, stop_reason, usage })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::stream;
    use serde_json::json;

    use super::*;

    fn stream_of(events: Vec<StreamEvent>) -> EventStream {
        Box::pin(stream::iter(events.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn collect_accumulates_text_deltas() {
        let s = stream_of(vec![
            StreamEvent::TextDelta("hel".into()),
            StreamEvent::TextDelta("lo".into()),
            StreamEvent::MessageEnd { stop_reason: StopReason::EndTurn, usage: Usage::default() },
        ]);
        let r = collect_response(s).await.unwrap();
        assert_eq!(r.text, "hello");
        assert_eq!(r.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn collect_assembles_tool_use_from_deltas() {
        let s = stream_of(vec![
            StreamEvent::ToolUseStart { id: "t1".into(), name: "Read".into() },
            StreamEvent::ToolUseInputDelta { id: "t1".into(), partial_json: "{\"file_".into() },
            StreamEvent::ToolUseInputDelta { id: "t1".into(), partial_json: "path\":\"a\"}".into() },
            StreamEvent::ToolUseEnd { id: "t1".into() },
            StreamEvent::MessageEnd { stop_reason: StopReason::ToolUse, usage: Usage::default() },
        ]);
        let r = collect_response(s).await.unwrap();
        assert_eq!(r.tool_uses.len(), 1);
        assert_eq!(r.tool_uses[0].input, json!({"file_path": "a"}));
        assert_eq!(r.stop_reason, StopReason::ToolUse);
    }

    #[tokio::test]
    async fn invalid_tool_input_becomes_empty_object() {
        let s = stream_of(vec![
            StreamEvent::ToolUseStart { id: "t1".into(), name: "Bash".into() },
            StreamEvent::ToolUseInputDelta { id: "t1".into(), partial_json: "{not json".into() },
            StreamEvent::ToolUseEnd { id: "t1".into() },
            StreamEvent::MessageEnd { stop_reason: StopReason::ToolUse, usage: Usage::default() },
        ]);
        let r = collect_response(s).await.unwrap();
        assert_eq!(r.tool_uses[0].input, json!({}));
    }

    #[tokio::test]
    async fn unclosed_tool_use_is_flushed() {
        let s = stream_of(vec![
            StreamEvent::ToolUseStart { id: "t1".into(), name: "Read".into() },
            StreamEvent::ToolUseInputDelta { id: "t1".into(), partial_json: "{}".into() },
            StreamEvent::MessageEnd { stop_reason: StopReason::ToolUse, usage: Usage::default() },
        ]);
        let r = collect_response(s).await.unwrap();
        assert_eq!(r.tool_uses.len(), 1);
        assert_eq!(r.tool_uses[0].name, "Read");
    }

    #[tokio::test]
    async fn usage_is_taken_from_message_end() {
        let s = stream_of(vec![StreamEvent::MessageEnd {
            stop_reason: StopReason::EndTurn,
            usage: Usage { input_tokens: 12, output_tokens: 34 },
        }]);
        let r = collect_response(s).await.unwrap();
        assert_eq!(r.usage.input_tokens, 12);
        assert_eq!(r.usage.output_tokens, 34);
    }
}
