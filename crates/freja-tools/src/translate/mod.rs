// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Provider tool dialects.
//!
//! Each provider family spells tool names and parameters its own way; the
//! translators map the canonical catalog into those conventions and back.
//! Translation is purely syntactic – no schema validation happens here, and
//! unknown names come back as `None` rather than an error so the caller can
//! surface a normal tool failure to the model.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::{self, CanonicalTool};

mod anthropic;
mod google;
mod openai;

pub use anthropic::AnthropicTranslator;
pub use google::GoogleTranslator;
pub use openai::OpenAiTranslator;

/// A tool definition in a provider's dialect.
#[derive(Debug, Clone)]
pub struct ProviderTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Anthropic,
    OpenAi,
    Google,
}

/// Adapter between the canonical catalog and one provider's tool format.
pub trait ToolTranslator: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Render canonical tools into the provider's naming and parameter
    /// conventions.
    fn provider_tools(&self, canonical: &[&CanonicalTool]) -> Vec<ProviderTool>;

    /// Inverse of [`provider_tools`](Self::provider_tools): resolve a
    /// provider-dialect tool call to `(ecp_method, ecp_params)`.  `None`
    /// when the name is unknown to this dialect.
    fn map_tool_call(&self, provider_name: &str, input: &Value) -> Option<(String, Value)>;

    fn canonical_name(&self, provider_name: &str) -> Option<&'static str>;

    fn is_supported(&self, provider_name: &str) -> bool {
        self.canonical_name(provider_name).is_some()
    }

    /// The provider-dialect name for a canonical tool.
    fn provider_name(&self, canonical: &str) -> Option<&'static str>;
}

/// Translator for a provider id.  The Anthropic-style dialect is the
/// fallback for providers without a dedicated one.
pub fn translator_for(provider_id: &str) -> Arc<dyn ToolTranslator> {
    match provider_id {
        "openai" | "ollama" => Arc::new(OpenAiTranslator::new()),
        "gemini" => Arc::new(GoogleTranslator::new()),
        _ => Arc::new(AnthropicTranslator::new()),
    }
}

/// The display name of a canonical tool – its Anthropic-dialect spelling.
///
/// Permission records and UI labels use this spelling regardless of which
/// dialect a session speaks, so a grant made while talking to one provider
/// carries over to the others.
pub fn display_name(canonical: &str) -> Option<&'static str> {
    NAME_TABLE
        .iter()
        .find(|r| r.canonical == canonical)
        .map(|r| r.anthropic)
}

// ── Name table ────────────────────────────────────────────────────────────────

pub(crate) struct NameRow {
    pub canonical: &'static str,
    pub anthropic: &'static str,
    pub openai: &'static str,
    pub google: &'static str,
}

macro_rules! row {
    ($c:literal, $a:literal, $o:literal, $g:literal) => {
        NameRow { canonical: $c, anthropic: $a, openai: $o, google: $g }
    };
}

/// One row per catalog entry; columns are the three dialect spellings.
pub(crate) static NAME_TABLE: &[NameRow] = &[
    row!("file.read", "Read", "read_file", "readFile"),
    row!("file.write", "Write", "write_file", "writeFile"),
    row!("file.edit", "Edit", "edit_file", "editFile"),
    row!("file.glob", "Glob", "glob_files", "globFiles"),
    row!("file.grep", "Grep", "grep_files", "grepFiles"),
    row!("file.list", "LS", "list_dir", "listDir"),
    row!("file.exists", "FileExists", "file_exists", "fileExists"),
    row!("file.delete", "DeleteFile", "delete_file", "deleteFile"),
    row!("file.rename", "RenameFile", "rename_file", "renameFile"),
    row!("file.mkdir", "CreateDir", "create_dir", "createDir"),
    row!("file.deleteDir", "DeleteDir", "delete_dir", "deleteDir"),
    row!("terminal.execute", "Bash", "execute_command", "executeCommand"),
    row!("terminal.spawn", "Spawn", "spawn_process", "spawnProcess"),
    row!("git.status", "GitStatus", "git_status", "gitStatus"),
    row!("git.diff", "GitDiff", "git_diff", "gitDiff"),
    row!("lsp.diagnostics", "LSP", "lsp_diagnostics", "lspDiagnostics"),
    row!("ai.todo.get", "TodoRead", "get_todo", "getTodo"),
    row!("ai.todo.write", "TodoWrite", "write_todo", "writeTodo"),
    row!("ai.plan.create", "PlanCreate", "create_plan", "createPlan"),
    row!("ai.plan.update", "PlanUpdate", "update_plan", "updatePlan"),
    row!("ai.plan.list", "PlanList", "list_plans", "listPlans"),
    row!("ai.plan.content", "PlanContent", "plan_content", "planContent"),
    row!("ai.spec.create", "SpecCreate", "create_spec", "createSpec"),
    row!("ai.spec.update", "SpecUpdate", "update_spec", "updateSpec"),
    row!("ai.spec.list", "SpecList", "list_specs", "listSpecs"),
    row!("ai.document.create", "DocumentCreate", "create_document", "createDocument"),
    row!("ai.document.update", "DocumentUpdate", "update_document", "updateDocument"),
    row!("ai.document.list", "DocumentList", "list_documents", "listDocuments"),
    row!("ai.document.get", "DocumentGet", "get_document", "getDocument"),
    row!("ai.document.search", "DocumentSearch", "search_documents", "searchDocuments"),
    row!("ai.message.search", "MessageSearch", "search_messages", "searchMessages"),
    row!("ai.persona.create", "PersonaCreate", "create_persona", "createPersona"),
    row!("ai.persona.update", "PersonaUpdate", "update_persona", "updatePersona"),
    row!("ai.persona.list", "PersonaList", "list_personas", "listPersonas"),
];

// ── Shared machinery ──────────────────────────────────────────────────────────

/// Bidirectional canonical ↔ provider name maps for one dialect column.
pub(crate) struct NameMaps {
    to_provider: HashMap<&'static str, &'static str>,
    to_canonical: HashMap<&'static str, &'static str>,
}

impl NameMaps {
    pub(crate) fn new(column: fn(&NameRow) -> &'static str) -> Self {
        let mut to_provider = HashMap::new();
        let mut to_canonical = HashMap::new();
        for row in NAME_TABLE {
            to_provider.insert(row.canonical, column(row));
            to_canonical.insert(column(row), row.canonical);
        }
        Self { to_provider, to_canonical }
    }

    pub(crate) fn provider(&self, canonical: &str) -> Option<&'static str> {
        self.to_provider.get(canonical).copied()
    }

    pub(crate) fn canonical(&self, provider: &str) -> Option<&'static str> {
        self.to_canonical.get(provider).copied()
    }
}

/// Canonical → wire parameter alias shared by all dialects.
pub(crate) fn wire_param(canonical: &str) -> &str {
    match canonical {
        "path" => "file_path",
        other => other,
    }
}

/// Wire → canonical parameter alias (inverse of [`wire_param`]).
pub(crate) fn canonical_param(wire: &str) -> &str {
    match wire {
        "file_path" => "path",
        other => other,
    }
}

/// snake_case → camelCase.
pub(crate) fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for ch in snake.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// camelCase → snake_case.
pub(crate) fn snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for ch in camel.chars() {
        if ch.is_uppercase() {
            out.push('_');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Build provider tools for one dialect: rename the tool through `maps` and
/// every parameter through `rename`.
pub(crate) fn build_provider_tools(
    maps: &NameMaps,
    canonical: &[&CanonicalTool],
    rename: impl Fn(&str) -> String,
) -> Vec<ProviderTool> {
    canonical
        .iter()
        .filter_map(|tool| {
            let name = maps.provider(tool.name)?;
            Some(ProviderTool {
                name: name.to_string(),
                description: tool.description.to_string(),
                input_schema: catalog::schema_for(tool.params, |p| rename(p.name)),
            })
        })
        .collect()
}

/// Resolve a provider-dialect call for one dialect: map the name back to the
/// catalog entry and every input key back through `inverse`.
pub(crate) fn map_call(
    maps: &NameMaps,
    provider_name: &str,
    input: &Value,
    inverse: impl Fn(&str) -> String,
) -> Option<(String, Value)> {
    let canonical = maps.canonical(provider_name)?;
    let tool = catalog::lookup(canonical)?;
    let params = match input {
        Value::Object(map) => {
            let renamed: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (inverse(k), v.clone()))
                .collect();
            Value::Object(renamed)
        }
        // Non-object input is passed through untouched; the host validates.
        other => other.clone(),
    };
    Some((tool.ecp_method.to_string(), params))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_table_covers_the_whole_catalog() {
        for tool in crate::catalog::CATALOG {
            assert!(
                NAME_TABLE.iter().any(|r| r.canonical == tool.name),
                "catalog entry {} missing from name table",
                tool.name
            );
        }
        assert_eq!(NAME_TABLE.len(), crate::catalog::CATALOG.len());
    }

    #[test]
    fn dialect_columns_have_no_duplicates() {
        for column in [
            |r: &NameRow| r.anthropic,
            |r: &NameRow| r.openai,
            |r: &NameRow| r.google,
        ] {
            let mut seen = std::collections::HashSet::new();
            for row in NAME_TABLE {
                assert!(seen.insert(column(row)), "duplicate dialect name: {}", column(row));
            }
        }
    }

    #[test]
    fn factory_selects_by_provider_id() {
        assert_eq!(translator_for("claude").dialect(), Dialect::Anthropic);
        assert_eq!(translator_for("openai").dialect(), Dialect::OpenAi);
        assert_eq!(translator_for("ollama").dialect(), Dialect::OpenAi);
        assert_eq!(translator_for("gemini").dialect(), Dialect::Google);
    }

    #[test]
    fn factory_falls_back_to_anthropic() {
        assert_eq!(translator_for("unknown-provider").dialect(), Dialect::Anthropic);
    }

    #[test]
    fn display_name_is_the_anthropic_spelling() {
        assert_eq!(display_name("terminal.execute"), Some("Bash"));
        assert_eq!(display_name("file.read"), Some("Read"));
        assert_eq!(display_name("nope"), None);
    }

    #[test]
    fn camel_and_snake_case_round_trip() {
        assert_eq!(camel_case("file_path"), "filePath");
        assert_eq!(snake_case("filePath"), "file_path");
        assert_eq!(camel_case("old_text"), "oldText");
        assert_eq!(snake_case(&camel_case("new_path")), "new_path");
    }

    #[test]
    fn param_alias_round_trips() {
        assert_eq!(wire_param("path"), "file_path");
        assert_eq!(canonical_param("file_path"), "path");
        assert_eq!(wire_param("command"), "command");
    }
}
