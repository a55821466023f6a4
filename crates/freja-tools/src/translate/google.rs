// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use crate::catalog::CanonicalTool;

use super::{
    build_provider_tools, camel_case, canonical_param, map_call, snake_case, wire_param, Dialect,
    NameMaps, NameRow, ProviderTool, ToolTranslator,
};

/// Google-style dialect: camelCase tool names (`readFile`,
/// `executeCommand`) and camelCase parameters (`filePath`, `oldText`).
pub struct GoogleTranslator {
    maps: NameMaps,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self { maps: NameMaps::new(|r: &NameRow| r.google) }
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolTranslator for GoogleTranslator {
    fn dialect(&self) -> Dialect {
        Dialect::Google
    }

    fn provider_tools(&self, canonical: &[&CanonicalTool]) -> Vec<ProviderTool> {
        build_provider_tools(&self.maps, canonical, |p| camel_case(wire_param(p)))
    }

    fn map_tool_call(&self, provider_name: &str, input: &Value) -> Option<(String, Value)> {
        map_call(&self.maps, provider_name, input, |k| {
            canonical_param(&snake_case(k)).to_string()
        })
    }

    fn canonical_name(&self, provider_name: &str) -> Option<&'static str> {
        self.maps.canonical(provider_name)
    }

    fn provider_name(&self, canonical: &str) -> Option<&'static str> {
        self.maps.provider(canonical)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::lookup;
    use freja_ecp::methods;

    #[test]
    fn read_tool_is_camel_cased_throughout() {
        let t = GoogleTranslator::new();
        let tools = t.provider_tools(&[lookup("file.read").unwrap()]);
        assert_eq!(tools[0].name, "readFile");
        assert!(tools[0].input_schema["properties"]["filePath"].is_object());
        assert!(tools[0].input_schema["properties"]["file_path"].is_null());
    }

    #[test]
    fn edit_params_are_camel_cased() {
        let t = GoogleTranslator::new();
        let tools = t.provider_tools(&[lookup("file.edit").unwrap()]);
        let props = &tools[0].input_schema["properties"];
        assert!(props["oldText"].is_object());
        assert!(props["newText"].is_object());
    }

    #[test]
    fn map_tool_call_inverts_camel_params() {
        let t = GoogleTranslator::new();
        let (method, params) = t
            .map_tool_call("editFile", &json!({"filePath": "a.rs", "oldText": "x", "newText": "y"}))
            .unwrap();
        assert_eq!(method, methods::FILE_EDIT);
        assert_eq!(params, json!({"path": "a.rs", "old_text": "x", "new_text": "y"}));
    }

    #[test]
    fn unknown_name_returns_none() {
        let t = GoogleTranslator::new();
        assert!(t.map_tool_call("read_file", &json!({})).is_none());
        assert!(t.is_supported("executeCommand"));
    }
}
