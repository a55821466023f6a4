// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use freja_ecp::{methods, EcpTransport, TerminalResult};

use crate::translate::ToolTranslator;

/// A single tool invocation requested by a model.
#[derive(Debug, Clone)]
pub struct ToolUse {
    /// Opaque identifier issued by the model (forwarded verbatim).
    pub id: String,
    /// Provider-dialect tool name.
    pub name: String,
    /// Parsed JSON input object.
    pub input: Value,
}

/// Who asked for the invocation, attributed at the ECP boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Human,
    Agent { agent_id: String },
}

/// The outcome of executing one tool.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolExecution {
    pub fn ok(result: Value) -> Self {
        Self { success: true, result: Some(result), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, result: None, error: Some(message.into()) }
    }

    /// Text rendering folded back into the conversation as a tool result.
    pub fn content(&self) -> String {
        if let Some(err) = &self.error {
            return err.clone();
        }
        match &self.result {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => String::new(),
        }
    }
}

/// A handler registered for a tool name, bypassing ECP translation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, tool_use: &ToolUse, caller: &Caller) -> ToolExecution;
}

/// Routes tool invocations: custom handlers, then hidden workflow-internal
/// handlers, then translation to an ECP method call.
///
/// All failure modes – unknown names, transport errors, non-zero terminal
/// exits – come back as `{success: false, error}`; nothing here propagates,
/// because the model decides whether to retry.
pub struct ToolExecutor {
    ecp: Arc<dyn EcpTransport>,
    translator: Arc<dyn ToolTranslator>,
    custom: Mutex<HashMap<String, Arc<dyn ToolHandler>>>,
    hidden: Mutex<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(ecp: Arc<dyn EcpTransport>, translator: Arc<dyn ToolTranslator>) -> Self {
        Self {
            ecp,
            translator,
            custom: Mutex::new(HashMap::new()),
            hidden: Mutex::new(HashMap::new()),
        }
    }

    pub fn translator(&self) -> &Arc<dyn ToolTranslator> {
        &self.translator
    }

    /// Register a host-provided handler that overrides translation for a
    /// tool name.
    pub fn register_custom(&self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.custom.lock().unwrap().insert(name.into(), handler);
    }

    /// Register a workflow-internal tool (e.g. agent handoff).  Hidden
    /// handlers are invoked like custom ones but are not part of the
    /// advertised tool set.
    pub fn register_hidden(&self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.hidden.lock().unwrap().insert(name.into(), handler);
    }

    pub fn has_hidden(&self, name: &str) -> bool {
        self.hidden.lock().unwrap().contains_key(name)
    }

    /// Execute one tool invocation on behalf of `caller` using the
    /// executor's default translator.
    pub async fn execute(
        &self,
        tool_use: &ToolUse,
        caller: &Caller,
        working_dir: Option<&str>,
    ) -> ToolExecution {
        let translator = Arc::clone(&self.translator);
        self.execute_with(tool_use, caller, translator.as_ref(), working_dir).await
    }

    /// Execute with an explicit dialect translator.
    ///
    /// Sessions speak different dialects but share one executor (and its
    /// custom/hidden handler registry), so the active session passes its own
    /// translator here.  `working_dir` is the execution's working directory;
    /// it is injected as `cwd` into terminal methods when the model did not
    /// pass one.
    pub async fn execute_with(
        &self,
        tool_use: &ToolUse,
        caller: &Caller,
        translator: &dyn ToolTranslator,
        working_dir: Option<&str>,
    ) -> ToolExecution {
        let custom = self.custom.lock().unwrap().get(&tool_use.name).cloned();
        if let Some(handler) = custom {
            debug!(tool = %tool_use.name, "dispatching to custom handler");
            return handler.handle(tool_use, caller).await;
        }

        let hidden = self.hidden.lock().unwrap().get(&tool_use.name).cloned();
        if let Some(handler) = hidden {
            debug!(tool = %tool_use.name, "dispatching to hidden handler");
            return handler.handle(tool_use, caller).await;
        }

        let Some((method, mut params)) = translator.map_tool_call(&tool_use.name, &tool_use.input)
        else {
            return ToolExecution::err(format!("unknown tool: {}", tool_use.name));
        };

        if methods::is_terminal_method(&method) {
            if let (Some(wd), Some(obj)) = (working_dir, params.as_object_mut()) {
                obj.entry("cwd").or_insert_with(|| Value::String(wd.to_string()));
            }
        }

        debug!(tool = %tool_use.name, method = %method, caller = ?caller, "tool → ECP");

        let raw = match self.ecp.request(&method, params).await {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = %tool_use.name, error = %e, "ECP request failed");
                return ToolExecution::err(e.to_string());
            }
        };

        if methods::is_terminal_method(&method) {
            if let Some(term) = TerminalResult::from_value(&raw) {
                if !term.success() {
                    let mut tagged = raw.clone();
                    if let Some(obj) = tagged.as_object_mut() {
                        obj.insert("_commandFailed".into(), Value::Bool(true));
                    }
                    return ToolExecution {
                        success: false,
                        result: Some(tagged),
                        error: Some(format!("exit code {}", term.exit_code)),
                    };
                }
            }
        }

        ToolExecution::ok(raw)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
