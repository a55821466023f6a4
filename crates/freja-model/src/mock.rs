// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::provider::{EventStream, Provider};
use crate::types::{ChatRequest, StopReason, StreamEvent, Usage};

/// Deterministic mock provider for tests.  Echoes the last user message
/// back as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<EventStream> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::Role::User))
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();

        let events: Vec<anyhow::Result<StreamEvent>> = vec![
            Ok(StreamEvent::TextDelta(reply)),
            Ok(StreamEvent::MessageEnd {
                stop_reason: StopReason::EndTurn,
                usage: Usage { input_tokens: 10, output_tokens: 10 },
            }),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A pre-scripted provider.  Each `chat_stream` call pops the next event
/// script from the front of the queue, so tests can specify exact sequences
/// – including tool-use turns – without network access.
pub struct ScriptedProvider {
    scripts: Arc<Mutex<Vec<Vec<StreamEvent>>>>,
    id: String,
    model: String,
    /// The last request seen, for assertions on what the core sent.
    pub last_request: Arc<Mutex<Option<ChatRequest>>>,
    /// Set by `cancel()`; tests assert the core asked the provider to abort.
    pub cancelled: Arc<AtomicBool>,
    session_id: Arc<Mutex<Option<String>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            id: "mock".into(),
            model: "scripted-mock-model".into(),
            last_request: Arc::new(Mutex::new(None)),
            cancelled: Arc::new(AtomicBool::new(false)),
            session_id: Arc::new(Mutex::new(None)),
        }
    }

    /// Masquerade as a specific provider id (affects dialect selection).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Convenience: provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![Self::text_script(reply)])
    }

    /// One full-text turn script ending in `end_turn`.
    pub fn text_script(reply: impl Into<String>) -> Vec<StreamEvent> {
        vec![
            StreamEvent::TextDelta(reply.into()),
            StreamEvent::MessageEnd {
                stop_reason: StopReason::EndTurn,
                usage: Usage { input_tokens: 5, output_tokens: 5 },
            },
        ]
    }

    /// One tool-use turn script ending in `tool_use`.
    pub fn tool_use_script(
        id: impl Into<String>,
        name: impl Into<String>,
        input_json: impl Into<String>,
    ) -> Vec<StreamEvent> {
        let id = id.into();
        vec![
            StreamEvent::ToolUseStart { id: id.clone(), name: name.into() },
            StreamEvent::ToolUseInputDelta { id: id.clone(), partial_json: input_json.into() },
            StreamEvent::ToolUseEnd { id },
            StreamEvent::MessageEnd {
                stop_reason: StopReason::ToolUse,
                usage: Usage { input_tokens: 5, output_tokens: 5 },
            },
        ]
    }

    /// Convenience: a tool-use round followed by a text round.
    pub fn tool_use_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        input_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            Self::tool_use_script(tool_id, tool_name, input_json),
            Self::text_script(final_text),
        ])
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<EventStream> {
        *self.last_request.lock().unwrap() = Some(req);
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                // Fallback when all scripts are consumed.
                Self::text_script("[no more scripts]")
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<anyhow::Result<StreamEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }

    async fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }

    fn set_session_id(&self, id: &str) {
        *self.session_id.lock().unwrap() = Some(id.to_string());
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::types::Message;

    use super::*;

    fn req(text: &str) -> ChatRequest {
        ChatRequest { messages: vec![Message::user(text)], ..Default::default() }
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let p = MockProvider;
        let r = p.chat(req("hi there")).await.unwrap();
        assert_eq!(r.text, "hi there");
        assert_eq!(r.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let p = ScriptedProvider::tool_use_then_text("t1", "Read", r#"{"file_path":"a"}"#, "done");

        let first = p.chat(req("go")).await.unwrap();
        assert_eq!(first.stop_reason, StopReason::ToolUse);
        assert_eq!(first.tool_uses[0].name, "Read");

        let second = p.chat(req("go")).await.unwrap();
        assert_eq!(second.text, "done");
        assert_eq!(second.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn scripted_fallback_when_scripts_exhausted() {
        let p = ScriptedProvider::new(vec![]);
        let r = p.chat(req("anything")).await.unwrap();
        assert!(r.text.contains("no more scripts"));
    }

    #[tokio::test]
    async fn last_request_is_captured() {
        let p = ScriptedProvider::always_text("ok");
        p.chat(req("captured?")).await.unwrap();
        let captured = p.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(captured.messages[0].as_text(), Some("captured?"));
    }

    #[tokio::test]
    async fn cancel_sets_flag() {
        let p = ScriptedProvider::always_text("ok");
        p.cancel().await;
        assert!(p.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn session_id_round_trips() {
        let p = ScriptedProvider::always_text("ok");
        assert!(p.session_id().is_none());
        p.set_session_id("cli-abc");
        assert_eq!(p.session_id().as_deref(), Some("cli-abc"));
    }
}
