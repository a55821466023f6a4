// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod pending;
mod service;

pub use pending::{PendingRequest, PermissionDecision};
pub use service::{
    is_terminal_tool, normalize_path, Approval, CheckResult, PermissionError, PermissionEvent,
    PermissionExport, PermissionService, Scope, DEFAULT_AUTO_APPROVED,
};
