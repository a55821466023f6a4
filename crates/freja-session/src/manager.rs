// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use freja_config::SessionConfig;
use freja_agents::{AgentDef, AgentRegistry};
use freja_model::{resolve_provider_id, Message, Provider, ToolSchema};
use freja_permissions::PermissionService;
use freja_tools::{translate, translator_for, ToolExecutor, CATALOG};

use crate::events::SessionEvent;
use crate::session::{SendUsage, SessionInner, SessionState};

/// Supplies provider connections by id.
///
/// The concrete HTTP/stream clients live with the host; tests hand out
/// scripted providers.
pub trait ProviderFactory: Send + Sync {
    fn provider(&self, provider_id: &str, model: &str) -> Option<Arc<dyn Provider>>;
}

/// Per-session knobs supplied by the caller (usually the workflow layer).
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub working_dir: Option<String>,
    /// Overrides the agent's own tool list when set.
    pub allowed_tools: Option<Vec<String>>,
    pub denied_tools: Vec<String>,
    /// Appends the delegation preamble enumerating the other agents.
    pub multi_agent: bool,
    /// Resume a provider-side session across process restarts.
    pub cli_session_id: Option<String>,
    /// Fallback provider id when the model string resolves to nothing.
    pub default_provider: Option<String>,
}

/// Final result of one `send` call.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Owns every live `(chat × agent)` session.
pub struct SessionManager {
    factory: Arc<dyn ProviderFactory>,
    permissions: Arc<PermissionService>,
    executor: Arc<ToolExecutor>,
    agents: Arc<AgentRegistry>,
    config: SessionConfig,
    sessions: StdMutex<HashMap<(String, String), Arc<SessionInner>>>,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        permissions: Arc<PermissionService>,
        executor: Arc<ToolExecutor>,
        agents: Arc<AgentRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            factory,
            permissions,
            executor,
            agents,
            config,
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    pub fn permissions(&self) -> &Arc<PermissionService> {
        &self.permissions
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    /// Send one user message through the session for `(chat_id, agent_id)`,
    /// creating the session on first use.  Events stream through `tx`.
    pub async fn send(
        &self,
        chat_id: &str,
        agent_id: &str,
        options: &SessionOptions,
        user_message: &str,
        tx: mpsc::Sender<SessionEvent>,
    ) -> anyhow::Result<SendOutcome> {
        let session = self.get_or_create(chat_id, agent_id, options)?;
        let (text, usage): (String, SendUsage) = session
            .send(&self.permissions, &self.executor, user_message, tx)
            .await?;
        Ok(SendOutcome {
            text,
            tokens_in: usage.tokens_in,
            tokens_out: usage.tokens_out,
        })
    }

    /// Abort the in-flight send for a session, if any.  The session stays
    /// usable: orphaned tool uses are repaired and the next `send` starts
    /// from a wire-valid history.
    pub async fn cancel(&self, chat_id: &str, agent_id: &str) {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(&(chat_id.to_string(), agent_id.to_string()))
            .cloned();
        if let Some(session) = session {
            debug!(session = %session.id, "cancelling session");
            session.cancel().await;
        }
    }

    /// The permission-scope session id for `(chat_id, agent_id)`, if the
    /// session exists.
    pub fn session_id(&self, chat_id: &str, agent_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(&(chat_id.to_string(), agent_id.to_string()))
            .map(|s| s.id.clone())
    }

    /// Provider-side session id captured from the last call, if any.
    pub fn cli_session_id(&self, chat_id: &str, agent_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(&(chat_id.to_string(), agent_id.to_string()))
            .and_then(|s| s.cli_session_id.lock().unwrap().clone())
    }

    /// Current loop state, `None` when the session does not exist.
    pub fn state(&self, chat_id: &str, agent_id: &str) -> Option<SessionState> {
        self.sessions
            .lock()
            .unwrap()
            .get(&(chat_id.to_string(), agent_id.to_string()))
            .map(|s| s.state())
    }

    /// Snapshot of the wire history, for persistence and tests.
    pub async fn history(&self, chat_id: &str, agent_id: &str) -> Vec<Message> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(&(chat_id.to_string(), agent_id.to_string()))
            .cloned();
        match session {
            Some(s) => s.history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Replace the wire history (conversation resume across restarts).
    pub async fn seed_history(
        &self,
        chat_id: &str,
        agent_id: &str,
        options: &SessionOptions,
        messages: Vec<Message>,
    ) -> anyhow::Result<()> {
        let session = self.get_or_create(chat_id, agent_id, options)?;
        *session.history.lock().await = messages;
        Ok(())
    }

    pub fn delete_session(&self, chat_id: &str, agent_id: &str) {
        self.sessions
            .lock()
            .unwrap()
            .remove(&(chat_id.to_string(), agent_id.to_string()));
    }

    // ── Construction ──────────────────────────────────────────────────────────

    fn get_or_create(
        &self,
        chat_id: &str,
        agent_id: &str,
        options: &SessionOptions,
    ) -> anyhow::Result<Arc<SessionInner>> {
        let key = (chat_id.to_string(), agent_id.to_string());
        if let Some(existing) = self.sessions.lock().unwrap().get(&key) {
            return Ok(Arc::clone(existing));
        }

        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| anyhow::anyhow!("unknown agent: {agent_id}"))?;

        let default_provider = options.default_provider.as_deref().unwrap_or("claude");
        let provider_id = if agent.provider.is_empty() {
            resolve_provider_id(&agent.model, default_provider)
        } else {
            agent.provider.clone()
        };
        let provider = self
            .factory
            .provider(&provider_id, &agent.model)
            .ok_or_else(|| anyhow::anyhow!("provider not available: {provider_id}"))?;

        let translator = translator_for(&provider_id);
        let tools = filter_tools(
            translator.provider_tools(&CATALOG.iter().collect::<Vec<_>>()),
            &agent,
            options,
            translator.as_ref(),
        );

        let system_prompt = self.build_system_prompt(&agent, options);
        let max_tokens = self
            .config
            .max_tokens_per_message
            .min(provider.capabilities().max_output_tokens);

        let session = Arc::new(SessionInner {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            agent,
            provider,
            translator,
            tools,
            system_prompt,
            working_dir: options.working_dir.clone(),
            max_tokens,
            max_tool_iterations: self.config.max_tool_iterations,
            state: StdMutex::new(SessionState::Idle),
            history: tokio::sync::Mutex::new(Vec::new()),
            cli_session_id: StdMutex::new(options.cli_session_id.clone()),
        });

        debug!(session = %session.id, chat = chat_id, agent = agent_id, provider = %provider_id, "session created");
        self.sessions.lock().unwrap().insert(key, Arc::clone(&session));
        Ok(session)
    }

    fn build_system_prompt(&self, agent: &AgentDef, options: &SessionOptions) -> String {
        let mut prompt = agent.system_prompt.clone();
        if let Some(agency) = &agent.agency {
            prompt.push_str("\n\n");
            prompt.push_str(agency);
        }
        if options.multi_agent && self.config.delegation_preamble {
            let others = self.agents.list_active_except(&agent.id);
            if !others.is_empty() {
                prompt.push_str(
                    "\n\nYou are one agent in a multi-agent workflow. \
                     You may delegate a sub-task with the DelegateToAgent tool. \
                     Available agents:\n",
                );
                for other in others {
                    prompt.push_str(&format!("- {} ({}): {}\n", other.name, other.id, other.role));
                }
            }
        }
        prompt
    }
}

/// Keep a provider tool when the allow list (if any) names it and the deny
/// list does not.  Lists may use any spelling: provider-dialect, canonical,
/// or display name.
fn filter_tools(
    all: Vec<freja_tools::ProviderTool>,
    agent: &AgentDef,
    options: &SessionOptions,
    translator: &dyn freja_tools::ToolTranslator,
) -> Vec<ToolSchema> {
    let allowed: Option<&[String]> = options
        .allowed_tools
        .as_deref()
        .or((!agent.tools.is_empty()).then_some(agent.tools.as_slice()));

    let name_matches = |tool_name: &str, list: &[String]| -> bool {
        if list.iter().any(|n| n == tool_name) {
            return true;
        }
        let canonical = translator.canonical_name(tool_name);
        if let Some(canonical) = canonical {
            if list.iter().any(|n| n == canonical) {
                return true;
            }
            if let Some(display) = translate::display_name(canonical) {
                if list.iter().any(|n| n == display) {
                    return true;
                }
            }
        }
        false
    };

    all.into_iter()
        .filter(|t| allowed.map(|list| name_matches(&t.name, list)).unwrap_or(true))
        .filter(|t| !name_matches(&t.name, &options.denied_tools))
        .map(|t| ToolSchema {
            name: t.name,
            description: t.description,
            input_schema: t.input_schema,
        })
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use freja_tools::translate::AnthropicTranslator;

    use super::*;

    fn provider_tools() -> Vec<freja_tools::ProviderTool> {
        let t = AnthropicTranslator::new();
        freja_tools::ToolTranslator::provider_tools(&t, &CATALOG.iter().collect::<Vec<_>>())
    }

    fn agent_with_tools(tools: &[&str]) -> AgentDef {
        let mut a = AgentDef::new("tester", "claude-sonnet-4-5");
        a.tools = tools.iter().map(|s| s.to_string()).collect();
        a
    }

    #[test]
    fn empty_agent_list_allows_everything() {
        let agent = agent_with_tools(&[]);
        let out = filter_tools(
            provider_tools(),
            &agent,
            &SessionOptions::default(),
            &AnthropicTranslator::new(),
        );
        assert_eq!(out.len(), CATALOG.len());
    }

    #[test]
    fn allow_list_filters_by_display_name() {
        let agent = agent_with_tools(&["Read", "Bash"]);
        let out = filter_tools(
            provider_tools(),
            &agent,
            &SessionOptions::default(),
            &AnthropicTranslator::new(),
        );
        let names: Vec<&str> = out.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Read"));
        assert!(names.contains(&"Bash"));
    }

    #[test]
    fn allow_list_accepts_canonical_spelling() {
        let agent = agent_with_tools(&["file.read"]);
        let out = filter_tools(
            provider_tools(),
            &agent,
            &SessionOptions::default(),
            &AnthropicTranslator::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Read");
    }

    #[test]
    fn deny_list_removes_from_allowed() {
        let agent = agent_with_tools(&[]);
        let options = SessionOptions {
            denied_tools: vec!["Bash".into(), "Spawn".into()],
            ..Default::default()
        };
        let out = filter_tools(
            provider_tools(),
            &agent,
            &options,
            &AnthropicTranslator::new(),
        );
        assert!(out.iter().all(|t| t.name != "Bash" && t.name != "Spawn"));
        assert_eq!(out.len(), CATALOG.len() - 2);
    }

    #[test]
    fn step_allow_list_overrides_agent_list() {
        let agent = agent_with_tools(&["Read"]);
        let options = SessionOptions {
            allowed_tools: Some(vec!["Glob".into()]),
            ..Default::default()
        };
        let out = filter_tools(
            provider_tools(),
            &agent,
            &options,
            &AnthropicTranslator::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Glob");
    }
}
