// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::service::Scope;

/// A tool invocation waiting for a human decision.
///
/// Created by the session loop when a check comes back denied; surfaced to
/// the UI, resolved through `PermissionService::approve` / `deny`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    /// The model-issued tool_use id; also the resolution key.
    pub tool_use_id: String,
    pub tool_name: String,
    pub session_id: String,
    /// Tool input, shown so the user knows what they are approving.
    pub input: Value,
    /// Target path extracted from the input, for folder-scope suggestions.
    pub target_path: Option<String>,
}

impl PendingRequest {
    pub fn new(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            tool_name: tool_name.into(),
            session_id: session_id.into(),
            input: Value::Null,
            target_path: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_target_path(mut self, path: Option<String>) -> Self {
        self.target_path = path;
        self
    }
}

/// The user's (or policy's) answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Approved { scope: Scope },
    Denied,
}

impl PermissionDecision {
    pub fn approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
