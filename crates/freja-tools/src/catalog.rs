// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The canonical tool catalog.
//!
//! Every tool the core can offer a model is defined here once, keyed by a
//! dotted dialect-independent name (`file.read`, `terminal.execute`, …) and
//! bound to the ECP method that serves it.  Provider-facing names and
//! parameter spellings are produced by the [`crate::translate`] dialects.

use serde_json::{json, Value};

use freja_ecp::methods;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    File,
    Terminal,
    Git,
    Lsp,
    Ai,
    Document,
}

/// One input parameter of a canonical tool.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    /// JSON Schema type (`"string"`, `"integer"`, `"boolean"`, `"array"`).
    pub kind: &'static str,
    pub required: bool,
    pub description: &'static str,
}

const fn req(name: &'static str, kind: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec { name, kind, required: true, description }
}

const fn opt(name: &'static str, kind: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec { name, kind, required: false, description }
}

/// A dialect-independent tool definition.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalTool {
    /// Dotted canonical name, e.g. `ai.document.create`.
    pub name: &'static str,
    pub description: &'static str,
    pub ecp_method: &'static str,
    pub category: ToolCategory,
    pub params: &'static [ParamSpec],
}

impl CanonicalTool {
    /// JSON Schema of the canonical input object.
    pub fn input_schema(&self) -> Value {
        schema_for(self.params, |p| p.name.to_string())
    }

    pub fn is_terminal(&self) -> bool {
        self.category == ToolCategory::Terminal
    }
}

/// Build a JSON Schema from param specs, renaming each parameter through
/// `rename` (dialects pass their own spelling rule).
pub fn schema_for(params: &[ParamSpec], rename: impl Fn(&ParamSpec) -> String) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in params {
        let wire = rename(p);
        properties.insert(
            wire.clone(),
            json!({ "type": p.kind, "description": p.description }),
        );
        if p.required {
            required.push(Value::String(wire));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

pub static CATALOG: &[CanonicalTool] = &[
    // ── File ──────────────────────────────────────────────────────────────────
    CanonicalTool {
        name: "file.read",
        description: "Read a file from the workspace",
        ecp_method: methods::FILE_READ,
        category: ToolCategory::File,
        params: &[
            req("path", "string", "Absolute or workspace-relative file path"),
            opt("offset", "integer", "First line to read (1-based)"),
            opt("limit", "integer", "Maximum number of lines to read"),
        ],
    },
    CanonicalTool {
        name: "file.write",
        description: "Create or overwrite a file",
        ecp_method: methods::FILE_WRITE,
        category: ToolCategory::File,
        params: &[
            req("path", "string", "Destination file path"),
            req("content", "string", "Full file content"),
        ],
    },
    CanonicalTool {
        name: "file.edit",
        description: "Replace an exact text span inside a file",
        ecp_method: methods::FILE_EDIT,
        category: ToolCategory::File,
        params: &[
            req("path", "string", "File to edit"),
            req("old_text", "string", "Exact text to replace"),
            req("new_text", "string", "Replacement text"),
        ],
    },
    CanonicalTool {
        name: "file.glob",
        description: "Find files matching a glob pattern",
        ecp_method: methods::FILE_GLOB,
        category: ToolCategory::File,
        params: &[
            req("pattern", "string", "Glob pattern, e.g. src/**/*.rs"),
            opt("path", "string", "Directory to search from"),
        ],
    },
    CanonicalTool {
        name: "file.grep",
        description: "Search file contents with a regular expression",
        ecp_method: methods::FILE_GREP,
        category: ToolCategory::File,
        params: &[
            req("pattern", "string", "Regular expression to search for"),
            opt("path", "string", "Directory or file to search"),
        ],
    },
    CanonicalTool {
        name: "file.list",
        description: "List directory contents",
        ecp_method: methods::FILE_LIST,
        category: ToolCategory::File,
        params: &[req("path", "string", "Directory to list")],
    },
    CanonicalTool {
        name: "file.exists",
        description: "Check whether a path exists",
        ecp_method: methods::FILE_EXISTS,
        category: ToolCategory::File,
        params: &[req("path", "string", "Path to probe")],
    },
    CanonicalTool {
        name: "file.delete",
        description: "Delete a file",
        ecp_method: methods::FILE_DELETE,
        category: ToolCategory::File,
        params: &[req("path", "string", "File to delete")],
    },
    CanonicalTool {
        name: "file.rename",
        description: "Rename or move a file",
        ecp_method: methods::FILE_RENAME,
        category: ToolCategory::File,
        params: &[
            req("path", "string", "Current path"),
            req("new_path", "string", "New path"),
        ],
    },
    CanonicalTool {
        name: "file.mkdir",
        description: "Create a directory (with parents)",
        ecp_method: methods::FILE_MKDIR,
        category: ToolCategory::File,
        params: &[req("path", "string", "Directory to create")],
    },
    CanonicalTool {
        name: "file.deleteDir",
        description: "Delete a directory recursively",
        ecp_method: methods::FILE_DELETE_DIR,
        category: ToolCategory::File,
        params: &[req("path", "string", "Directory to delete")],
    },
    // ── Terminal ──────────────────────────────────────────────────────────────
    CanonicalTool {
        name: "terminal.execute",
        description: "Execute a shell command and wait for it to finish",
        ecp_method: methods::TERMINAL_EXECUTE,
        category: ToolCategory::Terminal,
        params: &[
            req("command", "string", "Shell command to run"),
            opt("cwd", "string", "Working directory"),
            opt("timeout", "integer", "Timeout in seconds"),
        ],
    },
    CanonicalTool {
        name: "terminal.spawn",
        description: "Start a long-running process without waiting",
        ecp_method: methods::TERMINAL_SPAWN,
        category: ToolCategory::Terminal,
        params: &[
            req("command", "string", "Command to start"),
            opt("cwd", "string", "Working directory"),
        ],
    },
    // ── Git ───────────────────────────────────────────────────────────────────
    CanonicalTool {
        name: "git.status",
        description: "Show the working tree status",
        ecp_method: methods::GIT_STATUS,
        category: ToolCategory::Git,
        params: &[opt("path", "string", "Repository path")],
    },
    CanonicalTool {
        name: "git.diff",
        description: "Show changes against HEAD",
        ecp_method: methods::GIT_DIFF,
        category: ToolCategory::Git,
        params: &[
            opt("path", "string", "Repository path"),
            opt("staged", "boolean", "Diff the index instead of the working tree"),
        ],
    },
    // ── LSP ───────────────────────────────────────────────────────────────────
    CanonicalTool {
        name: "lsp.diagnostics",
        description: "Fetch language-server diagnostics",
        ecp_method: methods::LSP_DIAGNOSTICS,
        category: ToolCategory::Lsp,
        params: &[opt("path", "string", "File to fetch diagnostics for")],
    },
    // ── Todo / plan / spec ────────────────────────────────────────────────────
    CanonicalTool {
        name: "ai.todo.get",
        description: "Read the current todo list",
        ecp_method: methods::AI_TODO_GET,
        category: ToolCategory::Ai,
        params: &[],
    },
    CanonicalTool {
        name: "ai.todo.write",
        description: "Replace the todo list",
        ecp_method: methods::AI_TODO_WRITE,
        category: ToolCategory::Ai,
        params: &[req("items", "array", "Todo items in display order")],
    },
    CanonicalTool {
        name: "ai.plan.create",
        description: "Create a plan document",
        ecp_method: methods::CHAT_PLAN_CREATE,
        category: ToolCategory::Ai,
        params: &[
            req("title", "string", "Plan title"),
            req("content", "string", "Plan body in markdown"),
        ],
    },
    CanonicalTool {
        name: "ai.plan.update",
        description: "Update an existing plan",
        ecp_method: methods::CHAT_PLAN_UPDATE,
        category: ToolCategory::Ai,
        params: &[
            req("id", "string", "Plan id"),
            req("content", "string", "New plan body"),
        ],
    },
    CanonicalTool {
        name: "ai.plan.list",
        description: "List plans in this chat",
        ecp_method: methods::CHAT_PLAN_LIST,
        category: ToolCategory::Ai,
        params: &[],
    },
    CanonicalTool {
        name: "ai.plan.content",
        description: "Fetch a plan's content",
        ecp_method: methods::CHAT_PLAN_CONTENT,
        category: ToolCategory::Ai,
        params: &[req("id", "string", "Plan id")],
    },
    CanonicalTool {
        name: "ai.spec.create",
        description: "Create a specification document",
        ecp_method: methods::CHAT_SPEC_CREATE,
        category: ToolCategory::Ai,
        params: &[
            req("title", "string", "Spec title"),
            req("content", "string", "Spec body in markdown"),
        ],
    },
    CanonicalTool {
        name: "ai.spec.update",
        description: "Update an existing specification",
        ecp_method: methods::CHAT_SPEC_UPDATE,
        category: ToolCategory::Ai,
        params: &[
            req("id", "string", "Spec id"),
            req("content", "string", "New spec body"),
        ],
    },
    CanonicalTool {
        name: "ai.spec.list",
        description: "List specifications in this chat",
        ecp_method: methods::CHAT_SPEC_LIST,
        category: ToolCategory::Ai,
        params: &[],
    },
    // ── Documents ─────────────────────────────────────────────────────────────
    CanonicalTool {
        name: "ai.document.create",
        description: "Create a knowledge document",
        ecp_method: methods::CHAT_DOCUMENT_CREATE,
        category: ToolCategory::Document,
        params: &[
            req("title", "string", "Document title"),
            req("content", "string", "Document body in markdown"),
        ],
    },
    CanonicalTool {
        name: "ai.document.update",
        description: "Update a knowledge document",
        ecp_method: methods::CHAT_DOCUMENT_UPDATE,
        category: ToolCategory::Document,
        params: &[
            req("id", "string", "Document id"),
            req("content", "string", "New document body"),
        ],
    },
    CanonicalTool {
        name: "ai.document.list",
        description: "List knowledge documents",
        ecp_method: methods::CHAT_DOCUMENT_LIST,
        category: ToolCategory::Document,
        params: &[],
    },
    CanonicalTool {
        name: "ai.document.get",
        description: "Fetch a knowledge document",
        ecp_method: methods::CHAT_DOCUMENT_GET,
        category: ToolCategory::Document,
        params: &[req("id", "string", "Document id")],
    },
    CanonicalTool {
        name: "ai.document.search",
        description: "Search knowledge documents",
        ecp_method: methods::CHAT_DOCUMENT_SEARCH,
        category: ToolCategory::Document,
        params: &[
            req("query", "string", "Search query"),
            opt("limit", "integer", "Maximum results"),
        ],
    },
    CanonicalTool {
        name: "ai.message.search",
        description: "Search past chat messages",
        ecp_method: methods::CHAT_MESSAGE_SEARCH,
        category: ToolCategory::Ai,
        params: &[
            req("query", "string", "Search query"),
            opt("limit", "integer", "Maximum results"),
        ],
    },
    // ── Personas ──────────────────────────────────────────────────────────────
    CanonicalTool {
        name: "ai.persona.create",
        description: "Create an agent persona",
        ecp_method: methods::CHAT_PERSONA_CREATE,
        category: ToolCategory::Ai,
        params: &[
            req("name", "string", "Persona name"),
            req("description", "string", "Persona description"),
        ],
    },
    CanonicalTool {
        name: "ai.persona.update",
        description: "Update an agent persona",
        ecp_method: methods::CHAT_PERSONA_UPDATE,
        category: ToolCategory::Ai,
        params: &[
            req("id", "string", "Persona id"),
            req("description", "string", "New persona description"),
        ],
    },
    CanonicalTool {
        name: "ai.persona.list",
        description: "List agent personas",
        ecp_method: methods::CHAT_PERSONA_LIST,
        category: ToolCategory::Ai,
        params: &[],
    },
];

/// Look up a canonical tool by its dotted name.
pub fn lookup(name: &str) -> Option<&'static CanonicalTool> {
    CATALOG.iter().find(|t| t.name == name)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
