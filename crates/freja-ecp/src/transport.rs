// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The request/response bridge from the core to the host IDE.
///
/// Concrete transports (stdio pipe, WebSocket, in-process) live with the
/// host integration; the core only ever sees this trait.  Implementations
/// must be safe to share behind an `Arc` – tool calls from parallel branches
/// may hit the transport concurrently.
#[async_trait]
pub trait EcpTransport: Send + Sync {
    /// Perform one request and return the raw result value.
    ///
    /// Transport-level failures (connection lost, host error response) are
    /// returned as `Err`; the tool executor folds them into a failed tool
    /// result rather than propagating.
    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value>;
}

/// Result shape of `terminal/execute` and `terminal/spawn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalResult {
    #[serde(rename = "exitCode")]
    pub exit_code: i64,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl TerminalResult {
    /// Parse a terminal result out of a raw ECP result value.
    ///
    /// Returns `None` when the value has no `exitCode` field – the executor
    /// then treats the result as an opaque success.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.get("exitCode")?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
