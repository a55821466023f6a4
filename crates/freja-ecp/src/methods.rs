// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! ECP method names referenced by the canonical tool catalog.
//!
//! The host IDE serves these over a JSON-RPC-style `request(method, params)`
//! bridge.  Names are stable wire identifiers – renaming one is a protocol
//! break for every deployed host.

// ── File operations ───────────────────────────────────────────────────────────

pub const FILE_READ: &str = "file/read";
pub const FILE_WRITE: &str = "file/write";
pub const FILE_EDIT: &str = "file/edit";
pub const FILE_GLOB: &str = "file/glob";
pub const FILE_GREP: &str = "file/grep";
pub const FILE_LIST: &str = "file/list";
pub const FILE_EXISTS: &str = "file/exists";
pub const FILE_DELETE: &str = "file/delete";
pub const FILE_RENAME: &str = "file/rename";
pub const FILE_MKDIR: &str = "file/mkdir";
pub const FILE_DELETE_DIR: &str = "file/deleteDir";

// ── Terminal ──────────────────────────────────────────────────────────────────

pub const TERMINAL_EXECUTE: &str = "terminal/execute";
pub const TERMINAL_SPAWN: &str = "terminal/spawn";

// ── Git / LSP ─────────────────────────────────────────────────────────────────

pub const GIT_STATUS: &str = "git/status";
pub const GIT_DIFF: &str = "git/diff";
pub const LSP_DIAGNOSTICS: &str = "lsp/diagnostics";

// ── AI workspace artifacts ────────────────────────────────────────────────────

pub const AI_TODO_GET: &str = "ai/todo/get";
pub const AI_TODO_WRITE: &str = "ai/todo/write";

pub const CHAT_PLAN_CREATE: &str = "chat/plan/create";
pub const CHAT_PLAN_UPDATE: &str = "chat/plan/update";
pub const CHAT_PLAN_LIST: &str = "chat/plan/list";
pub const CHAT_PLAN_CONTENT: &str = "chat/plan/content";

pub const CHAT_SPEC_CREATE: &str = "chat/spec/create";
pub const CHAT_SPEC_UPDATE: &str = "chat/spec/update";
pub const CHAT_SPEC_LIST: &str = "chat/spec/list";

pub const CHAT_DOCUMENT_CREATE: &str = "chat/document/create";
pub const CHAT_DOCUMENT_UPDATE: &str = "chat/document/update";
pub const CHAT_DOCUMENT_LIST: &str = "chat/document/list";
pub const CHAT_DOCUMENT_GET: &str = "chat/document/get";
pub const CHAT_DOCUMENT_SEARCH: &str = "chat/document/search";

pub const CHAT_MESSAGE_SEARCH: &str = "chat/message/search";

pub const CHAT_PERSONA_CREATE: &str = "chat/persona/create";
pub const CHAT_PERSONA_UPDATE: &str = "chat/persona/update";
pub const CHAT_PERSONA_LIST: &str = "chat/persona/list";

/// Returns `true` when `method` runs a terminal process, i.e. its result
/// carries `{exit_code, stdout, stderr}` and non-zero exit means failure.
pub fn is_terminal_method(method: &str) -> bool {
    matches!(method, TERMINAL_EXECUTE | TERMINAL_SPAWN)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
