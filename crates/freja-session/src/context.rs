// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Context window assembly.
//!
//! A prompt is head (system), torso (conversation + compaction summaries)
//! and tail (closing instructions).  Only the torso is negotiable: when the
//! estimate blows the budget, the oldest torso entries are dropped first.
//! Head and tail are never trimmed.

use chrono::{DateTime, Utc};

use freja_model::{estimate_tokens, Message, Role};

/// Hard cap on the response reserve subtracted from the window.
const RESPONSE_RESERVE_CAP: usize = 8_000;

/// Minimum meaningful assistant reply, in non-whitespace characters.
const MIN_ASSISTANT_CHARS: usize = 5;

/// One active conversation record offered to the builder.
#[derive(Debug, Clone)]
pub struct BuilderMessage {
    pub id: String,
    /// `"user"`, `"assistant"` or `"system"`; anything else is dropped.
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A summary standing in for a span of deactivated messages.
#[derive(Debug, Clone)]
pub struct Compaction {
    pub id: String,
    pub content: String,
    /// First message the summary covers.  The compaction is "applied" only
    /// once that message has left the active set.
    pub start_message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Assembled prompt plus diagnostics.
#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub messages: Vec<Message>,
    pub total_tokens: usize,
    /// Diagnostic only – the prompt is sent even when it exceeds the
    /// window; providers enforce their own limits.
    pub exceeds_window: bool,
    pub messages_loaded: usize,
    pub compactions_applied: usize,
}

enum TorsoEntry {
    Active(BuilderMessage),
    Summary(Compaction),
}

impl TorsoEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Active(m) => m.timestamp,
            Self::Summary(c) => c.timestamp,
        }
    }

    fn tokens(&self) -> usize {
        match self {
            Self::Active(m) => estimate_tokens(&m.content),
            Self::Summary(c) => estimate_tokens(&c.content),
        }
    }
}

fn keep_message(m: &BuilderMessage) -> bool {
    if !matches!(m.role.as_str(), "user" | "assistant" | "system") {
        return false;
    }
    let trimmed = m.content.trim();
    if trimmed.is_empty() || trimmed == "(No response)" {
        return false;
    }
    if m.role == "assistant" {
        let non_ws = m.content.chars().filter(|c| !c.is_whitespace()).count();
        if non_ws < MIN_ASSISTANT_CHARS {
            return false;
        }
    }
    true
}

/// Build a provider-ready prompt from the active conversation.
pub fn build_context(
    system_prompt: &str,
    active: &[BuilderMessage],
    compactions: &[Compaction],
    context_window: usize,
    tail_instructions: Option<&str>,
) -> BuiltContext {
    let head_tokens = estimate_tokens(system_prompt);
    let tail_tokens = tail_instructions.map(estimate_tokens).unwrap_or(0);
    let reserve = (context_window / 4).min(RESPONSE_RESERVE_CAP);
    let budget = context_window
        .saturating_sub(head_tokens)
        .saturating_sub(tail_tokens)
        .saturating_sub(reserve);

    let active_ids: Vec<&str> = active.iter().map(|m| m.id.as_str()).collect();

    let mut torso: Vec<TorsoEntry> = active
        .iter()
        .filter(|m| keep_message(m))
        .cloned()
        .map(TorsoEntry::Active)
        .collect();
    torso.extend(
        compactions
            .iter()
            .filter(|c| !active_ids.contains(&c.start_message_id.as_str()))
            .cloned()
            .map(TorsoEntry::Summary),
    );
    torso.sort_by_key(|e| e.timestamp());

    // Overflow trimming: drop oldest while over budget, always keeping at
    // least one entry so the model has something to answer.
    let mut torso_tokens: usize = torso.iter().map(|e| e.tokens()).sum();
    while torso_tokens > budget && torso.len() > 1 {
        let dropped = torso.remove(0);
        torso_tokens -= dropped.tokens();
    }

    let mut messages = Vec::with_capacity(torso.len() + 2);
    messages.push(Message::system(system_prompt));
    let mut messages_loaded = 0;
    let mut compactions_applied = 0;
    for entry in &torso {
        match entry {
            TorsoEntry::Active(m) => {
                messages_loaded += 1;
                let role = match m.role.as_str() {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    _ => Role::System,
                };
                messages.push(Message { role, content: freja_model::MessageContent::Text(m.content.clone()) });
            }
            TorsoEntry::Summary(c) => {
                compactions_applied += 1;
                messages.push(Message::system(c.content.clone()));
            }
        }
    }
    if let Some(tail) = tail_instructions {
        messages.push(Message::system(tail));
    }

    let total_tokens = head_tokens + tail_tokens + torso_tokens;
    BuiltContext {
        messages,
        total_tokens,
        exceeds_window: total_tokens > context_window,
        messages_loaded,
        compactions_applied,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
