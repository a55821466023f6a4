// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use crate::catalog::CanonicalTool;

use super::{
    build_provider_tools, canonical_param, map_call, wire_param, Dialect, NameMaps, NameRow,
    ProviderTool, ToolTranslator,
};

/// OpenAI-style dialect: snake_case verb_noun tool names (`read_file`,
/// `execute_command`) with snake_case parameters.  Also used for
/// OpenAI-compatible local runtimes (Ollama).
pub struct OpenAiTranslator {
    maps: NameMaps,
}

impl OpenAiTranslator {
    pub fn new() -> Self {
        Self { maps: NameMaps::new(|r: &NameRow| r.openai) }
    }
}

impl Default for OpenAiTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolTranslator for OpenAiTranslator {
    fn dialect(&self) -> Dialect {
        Dialect::OpenAi
    }

    fn provider_tools(&self, canonical: &[&CanonicalTool]) -> Vec<ProviderTool> {
        build_provider_tools(&self.maps, canonical, |p| wire_param(p).to_string())
    }

    fn map_tool_call(&self, provider_name: &str, input: &Value) -> Option<(String, Value)> {
        map_call(&self.maps, provider_name, input, |k| canonical_param(k).to_string())
    }

    fn canonical_name(&self, provider_name: &str) -> Option<&'static str> {
        self.maps.canonical(provider_name)
    }

    fn provider_name(&self, canonical: &str) -> Option<&'static str> {
        self.maps.provider(canonical)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
