// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model-string → provider-id resolution.
//!
//! Agents are configured with a bare model name (`claude-sonnet-4-5`,
//! `gpt-4o`, …); the session manager needs the owning provider to pick a
//! connection and a tool dialect.  Resolution is a prefix match over the
//! well-known model families, falling back to the caller-supplied default
//! for anything unrecognised (self-hosted or aliased models).

/// Resolve the provider id for a model name.
pub fn resolve_provider_id(model: &str, default: &str) -> String {
    let m = model.trim();
    if m.starts_with("claude-") {
        "claude".into()
    } else if m.starts_with("gpt-") {
        "openai".into()
    } else if m.starts_with("gemini-") {
        "gemini".into()
    } else if m.starts_with("llama-") {
        "ollama".into()
    } else {
        default.into()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
