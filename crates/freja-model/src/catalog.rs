// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Static model catalog: context windows and output-token ceilings.
//!
//! The single source of truth the context builder and session manager fall
//! back on when the host does not pass an explicit window.  Entries match by
//! model-name prefix so point releases (`claude-sonnet-4-5-20250929`) pick
//! up their family's limits without a catalog change.

/// Metadata for one model family.
#[derive(Debug, Clone)]
pub struct ModelCatalogEntry {
    /// Owning provider id (`"claude"`, `"openai"`, `"gemini"`, `"ollama"`).
    pub provider: &'static str,
    /// Model-name prefix this entry covers.
    pub model_prefix: &'static str,
    pub context_window: usize,
    pub max_output_tokens: u32,
}

pub static CATALOG: &[ModelCatalogEntry] = &[
    // ── Anthropic ─────────────────────────────────────────────────────────────
    ModelCatalogEntry { provider: "claude", model_prefix: "claude-opus-4", context_window: 200_000, max_output_tokens: 32_000 },
    ModelCatalogEntry { provider: "claude", model_prefix: "claude-sonnet-4", context_window: 200_000, max_output_tokens: 64_000 },
    ModelCatalogEntry { provider: "claude", model_prefix: "claude-haiku-4", context_window: 200_000, max_output_tokens: 64_000 },
    ModelCatalogEntry { provider: "claude", model_prefix: "claude-", context_window: 200_000, max_output_tokens: 16_384 },
    // ── OpenAI ────────────────────────────────────────────────────────────────
    ModelCatalogEntry { provider: "openai", model_prefix: "gpt-4o", context_window: 128_000, max_output_tokens: 16_384 },
    ModelCatalogEntry { provider: "openai", model_prefix: "gpt-4.1", context_window: 1_000_000, max_output_tokens: 32_768 },
    ModelCatalogEntry { provider: "openai", model_prefix: "gpt-", context_window: 128_000, max_output_tokens: 16_384 },
    // ── Google ────────────────────────────────────────────────────────────────
    ModelCatalogEntry { provider: "gemini", model_prefix: "gemini-2", context_window: 1_000_000, max_output_tokens: 65_536 },
    ModelCatalogEntry { provider: "gemini", model_prefix: "gemini-", context_window: 1_000_000, max_output_tokens: 8_192 },
    // ── Local (Ollama) ────────────────────────────────────────────────────────
    ModelCatalogEntry { provider: "ollama", model_prefix: "llama-", context_window: 128_000, max_output_tokens: 8_192 },
];

/// Look up the catalog entry for a model name (longest matching prefix).
pub fn lookup(model: &str) -> Option<&'static ModelCatalogEntry> {
    CATALOG
        .iter()
        .filter(|e| model.starts_with(e.model_prefix))
        .max_by_key(|e| e.model_prefix.len())
}

/// Context window for a model, or the supplied fallback when unknown.
pub fn context_window_or(model: &str, fallback: usize) -> usize {
    lookup(model).map(|e| e.context_window).unwrap_or(fallback)
}

/// All catalog model prefixes owned by a provider.
pub fn models_for_provider(provider: &str) -> Vec<String> {
    CATALOG
        .iter()
        .filter(|e| e.provider == provider)
        .map(|e| e.model_prefix.to_string())
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_longest_prefix() {
        let e = lookup("claude-sonnet-4-5-20250929").unwrap();
        assert_eq!(e.model_prefix, "claude-sonnet-4");
        assert_eq!(e.max_output_tokens, 64_000);
    }

    #[test]
    fn generic_family_prefix_is_the_fallback() {
        let e = lookup("claude-legacy-2").unwrap();
        assert_eq!(e.model_prefix, "claude-");
    }

    #[test]
    fn unknown_model_returns_none() {
        assert!(lookup("mistral-large").is_none());
    }

    #[test]
    fn context_window_or_uses_fallback() {
        assert_eq!(context_window_or("mystery-model", 42_000), 42_000);
        assert_eq!(context_window_or("gpt-4o-mini", 42_000), 128_000);
    }

    #[test]
    fn models_for_provider_filters() {
        let models = models_for_provider("gemini");
        assert!(!models.is_empty());
        assert!(models.iter().all(|m| m.starts_with("gemini-")));
    }
}
