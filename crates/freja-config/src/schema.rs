// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper – returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `false`, so fields
/// that should be enabled unless explicitly disabled need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub permissions: PermissionConfig,
}

/// Knobs for the workflow executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Hard ceiling on scheduler iterations for a single execution.
    /// Exceeding it fails the execution rather than looping forever.
    #[serde(default = "WorkflowConfig::default_max_iterations")]
    pub max_iterations: u32,
    /// Maximum nesting depth for agent-to-agent handoffs.  Beyond this the
    /// delegation request is ignored and the calling agent continues alone.
    #[serde(default = "WorkflowConfig::default_max_handoff_depth")]
    pub max_handoff_depth: u32,
    /// Agent id used when a step names no agent and the workflow sets no
    /// default.
    #[serde(default = "WorkflowConfig::default_agent")]
    pub default_agent: String,
}

impl WorkflowConfig {
    fn default_max_iterations() -> u32 {
        10
    }
    fn default_max_handoff_depth() -> u32 {
        5
    }
    fn default_agent() -> String {
        "assistant".into()
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::default_max_iterations(),
            max_handoff_depth: Self::default_max_handoff_depth(),
            default_agent: Self::default_agent(),
        }
    }
}

/// Knobs for AI sessions and the context window builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum output tokens requested per provider message.
    #[serde(default = "SessionConfig::default_max_tokens")]
    pub max_tokens_per_message: u32,
    /// Context window fallback when the model is not in the catalog.
    #[serde(default = "SessionConfig::default_context_window")]
    pub context_window: usize,
    /// Upper bound of the response reserve subtracted from the prompt
    /// budget (the reserve is `min(window / 4, this)`).
    #[serde(default = "SessionConfig::default_response_reserve_cap")]
    pub response_reserve_cap: usize,
    /// Safety valve for runaway tool loops within one `send` call.
    #[serde(default = "SessionConfig::default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Append the delegation preamble (available agents) to the system
    /// prompt of sessions that run inside a multi-agent workflow.
    #[serde(default = "default_true")]
    pub delegation_preamble: bool,
}

impl SessionConfig {
    fn default_max_tokens() -> u32 {
        16_384
    }
    fn default_context_window() -> usize {
        128_000
    }
    fn default_response_reserve_cap() -> usize {
        8_000
    }
    fn default_max_tool_iterations() -> u32 {
        25
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_message: Self::default_max_tokens(),
            context_window: Self::default_context_window(),
            response_reserve_cap: Self::default_response_reserve_cap(),
            max_tool_iterations: Self::default_max_tool_iterations(),
            delegation_preamble: true,
        }
    }
}

/// Knobs for the permission service.
///
/// `PermissionService::from_config` seeds `auto_approve` into the global
/// tier at construction and applies `session_approval_ttl_secs` as the
/// default lifetime of session-scoped grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Extra tool names auto-approved at global scope on top of the
    /// built-in read-only set.  Terminal tools are rejected here.
    #[serde(default)]
    pub auto_approve: Vec<String>,
    /// Lifetime of session-scoped approvals in seconds.  `None` means they
    /// live until the session ends.
    #[serde(default)]
    pub session_approval_ttl_secs: Option<u64>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
