// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent definitions and the registry that owns them.
//!
//! An agent is a named configuration – system prompt, model, tool list –
//! invoked as a reasoning role inside a workflow.  The four system agents
//! are seeded at construction and immutable: update and delete silently
//! no-op on them, and `duplicate` is the supported way to derive an editable
//! variant.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A stored agent definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub id: String,
    pub name: String,
    /// Short role label shown in transcripts ("Coder", "Reviewer", …).
    pub role: String,
    /// Provider id; empty means resolve from the model string.
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    /// Allowed tool names; empty means every registered tool.
    pub tools: Vec<String>,
    pub persona_id: Option<String>,
    /// Free-form autonomy hint forwarded into the system prompt.
    pub agency: Option<String>,
    pub is_system: bool,
    pub is_active: bool,
}

impl AgentDef {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            role: String::new(),
            provider: String::new(),
            model: model.into(),
            system_prompt: String::new(),
            tools: Vec::new(),
            persona_id: None,
            agency: None,
            is_system: false,
            is_active: true,
        }
    }
}

fn system_agent(id: &str, name: &str, role: &str, system_prompt: &str) -> AgentDef {
    AgentDef {
        id: id.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        provider: String::new(),
        model: "claude-sonnet-4-5".to_string(),
        system_prompt: system_prompt.to_string(),
        tools: Vec::new(),
        persona_id: None,
        agency: None,
        is_system: true,
        is_active: true,
    }
}

fn seeded_system_agents() -> Vec<AgentDef> {
    vec![
        system_agent(
            "assistant",
            "Assistant",
            "Generalist",
            "You are a capable software assistant working inside an IDE. \
             Answer precisely, prefer tools over guessing, and keep responses short.",
        ),
        system_agent(
            "coder",
            "Coder",
            "Implementation",
            "You are an expert programmer. Implement the requested change with \
             minimal, focused edits. Read relevant files before editing them. \
             Do not refactor beyond the task.",
        ),
        system_agent(
            "code-reviewer",
            "Code Reviewer",
            "Review",
            "You are a rigorous code reviewer. Evaluate the presented work for \
             correctness, security, and maintainability. State concrete findings \
             with file and line references where possible.",
        ),
        system_agent(
            "architect",
            "Architect",
            "Design",
            "You are a software architect. Weigh trade-offs explicitly, propose \
             the simplest design that satisfies the requirements, and call out \
             risks and open questions.",
        ),
    ]
}

/// Thread-safe agent store.
///
/// System agents are immutable; everything else is plain CRUD.  Records are
/// shared across executions by id – the registry never hands out references
/// into its own storage.
pub struct AgentRegistry {
    agents: Mutex<HashMap<String, AgentDef>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// Registry pre-seeded with the system agents.
    pub fn new() -> Self {
        let agents = seeded_system_agents()
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        Self { agents: Mutex::new(agents) }
    }

    pub fn get(&self, id: &str) -> Option<AgentDef> {
        self.agents.lock().unwrap().get(id).cloned()
    }

    /// All agents, sorted by name for stable display.
    pub fn list(&self) -> Vec<AgentDef> {
        let mut all: Vec<AgentDef> = self.agents.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Active agents other than `except`, for the delegation preamble.
    pub fn list_active_except(&self, except: &str) -> Vec<AgentDef> {
        self.list()
            .into_iter()
            .filter(|a| a.is_active && a.id != except)
            .collect()
    }

    /// Insert a new agent.  Overwrites nothing: an id collision keeps the
    /// existing record and returns `false`.
    pub fn create(&self, agent: AgentDef) -> bool {
        let mut agents = self.agents.lock().unwrap();
        if agents.contains_key(&agent.id) {
            return false;
        }
        agents.insert(agent.id.clone(), agent);
        true
    }

    /// Update a mutable agent.  Silently no-ops on system agents and
    /// unknown ids (matching delete semantics, so callers need no special
    /// casing for the seeded set).
    pub fn update(&self, agent: AgentDef) {
        let mut agents = self.agents.lock().unwrap();
        match agents.get(&agent.id) {
            Some(existing) if existing.is_system => {
                debug!(id = %agent.id, "ignoring update of system agent");
            }
            Some(_) => {
                agents.insert(agent.id.clone(), agent);
            }
            None => {}
        }
    }

    /// Remove a mutable agent.  Silently no-ops on system agents.
    pub fn remove(&self, id: &str) {
        let mut agents = self.agents.lock().unwrap();
        if agents.get(id).map(|a| a.is_system).unwrap_or(false) {
            debug!(id, "ignoring removal of system agent");
            return;
        }
        agents.remove(id);
    }

    /// Copy an agent under a new name.  The copy gets a fresh id and is
    /// always mutable, which is the supported way to customise a system
    /// agent.
    pub fn duplicate(&self, id: &str, new_name: &str) -> Option<AgentDef> {
        let source = self.get(id)?;
        let copy = AgentDef {
            id: Uuid::new_v4().to_string(),
            name: new_name.to_string(),
            is_system: false,
            ..source
        };
        self.agents
            .lock()
            .unwrap()
            .insert(copy.id.clone(), copy.clone());
        Some(copy)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
