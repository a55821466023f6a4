// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use freja_config::PermissionConfig;

use crate::pending::{PendingRequest, PermissionDecision};

/// Lifespan of a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Single execution; leaves no stored record.
    Once,
    Session,
    Folder,
    Global,
}

/// A stored approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub tool_name: String,
    pub scope: Scope,
    pub session_id: Option<String>,
    pub folder_path: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Approval {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e <= now).unwrap_or(false)
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub allowed: bool,
    pub approval: Option<Approval>,
    pub reason: Option<String>,
}

impl CheckResult {
    fn denied(reason: impl Into<String>) -> Self {
        Self { allowed: false, approval: None, reason: Some(reason.into()) }
    }
}

/// Bus events emitted on every store mutation.
#[derive(Debug, Clone)]
pub enum PermissionEvent {
    ApprovalAdded(Approval),
    ApprovalRemoved { tool_name: String, scope: Scope },
    ApprovalsCleared,
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("terminal tools are never auto-approved: {0}")]
    TerminalAutoApprove(String),
    #[error("no pending request for tool use {0}")]
    UnknownPending(String),
    #[error("folder scope requires a folder path")]
    MissingFolderPath,
}

/// Tools pre-approved at global scope: read-only file tools plus the
/// todo/plan/spec/document/persona workspace tools.  Terminal execution is
/// deliberately absent and can never be added.
pub static DEFAULT_AUTO_APPROVED: &[&str] = &[
    "Read",
    "Glob",
    "Grep",
    "LS",
    "LSP",
    "TodoRead",
    "TodoWrite",
    "PlanCreate",
    "PlanUpdate",
    "PlanList",
    "PlanContent",
    "SpecCreate",
    "SpecUpdate",
    "SpecList",
    "DocumentCreate",
    "DocumentUpdate",
    "DocumentList",
    "DocumentGet",
    "DocumentSearch",
    "PersonaCreate",
    "PersonaUpdate",
    "PersonaList",
];

/// Returns `true` for tools that execute terminal processes, in any dialect
/// spelling.  These always require an explicit approval flow.
pub fn is_terminal_tool(name: &str) -> bool {
    matches!(
        name,
        "Bash"
            | "Spawn"
            | "terminal.execute"
            | "terminal.spawn"
            | "execute_command"
            | "spawn_process"
            | "executeCommand"
            | "spawnProcess"
    )
}

/// Normalize a filesystem path for folder-prefix matching.
///
/// Backslashes become forward slashes and a trailing slash is guaranteed so
/// `/a/b` never prefix-matches `/a/bc`.  Idempotent.
pub fn normalize_path(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    if !p.ends_with('/') {
        p.push('/');
    }
    p
}

/// Serialized form of the durable approval tiers.
///
/// Session approvals are transient and excluded; the default auto-approved
/// set is excluded so re-import does not duplicate it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionExport {
    pub global: Vec<String>,
    pub folder: Vec<Approval>,
}

struct Inner {
    global: HashMap<String, Approval>,
    session: Vec<Approval>,
    folder: Vec<Approval>,
    pending: HashMap<String, PendingEntry>,
}

struct PendingEntry {
    request: PendingRequest,
    responder: oneshot::Sender<PermissionDecision>,
}

/// Process-wide scoped approval store.
///
/// Thread-safe behind `&self`; share one instance via `Arc` – tests build
/// their own so nothing global leaks between them.
pub struct PermissionService {
    inner: Mutex<Inner>,
    events: broadcast::Sender<PermissionEvent>,
    /// Default lifetime for session-scoped grants added without an explicit
    /// expiry, from `permissions.session_approval_ttl_secs`.
    session_ttl: Option<Duration>,
}

impl Default for PermissionService {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionService {
    /// Build a service pre-loaded with the default auto-approved tools.
    pub fn new() -> Self {
        Self::from_config(&PermissionConfig::default())
    }

    /// Build a service from host configuration: the built-in auto-approved
    /// set plus the configured extras, and the session-grant TTL.
    ///
    /// Terminal tools in `auto_approve` are skipped with a warning – the
    /// config file must not be able to lift that rule.
    pub fn from_config(config: &PermissionConfig) -> Self {
        let now = Utc::now();
        let global_approval = |tool: &str| Approval {
            tool_name: tool.to_string(),
            scope: Scope::Global,
            session_id: None,
            folder_path: None,
            granted_at: now,
            expires_at: None,
        };

        let mut global: HashMap<String, Approval> = DEFAULT_AUTO_APPROVED
            .iter()
            .map(|t| (t.to_string(), global_approval(t)))
            .collect();
        for tool in &config.auto_approve {
            if is_terminal_tool(tool) {
                warn!(tool, "ignoring configured auto-approval for terminal tool");
                continue;
            }
            global.insert(tool.clone(), global_approval(tool));
        }

        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner {
                global,
                session: Vec::new(),
                folder: Vec::new(),
                pending: HashMap::new(),
            }),
            events,
            session_ttl: config
                .session_approval_ttl_secs
                .map(|secs| Duration::seconds(secs as i64)),
        }
    }

    /// Build a service with an empty store (no defaults).  Test hook.
    pub fn empty() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner {
                global: HashMap::new(),
                session: Vec::new(),
                folder: Vec::new(),
                pending: HashMap::new(),
            }),
            events,
            session_ttl: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PermissionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PermissionEvent) {
        // Nobody listening is fine; a lagged subscriber is their problem.
        if let Err(e) = self.events.send(event) {
            debug!("permission event dropped: {e}");
        }
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Check whether `tool_name` is approved for `session_id`, optionally
    /// against a target path for folder-scoped grants.
    ///
    /// Lookup priority: global → session → folder.  Expired entries are
    /// removed as they are discovered.  Terminal tools skip the global tier
    /// entirely – only an explicit session or folder grant lets them pass.
    pub fn check(
        &self,
        tool_name: &str,
        session_id: &str,
        target_path: Option<&str>,
    ) -> CheckResult {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        if !is_terminal_tool(tool_name) {
            if let Some(a) = inner.global.get(tool_name) {
                if a.expired(now) {
                    inner.global.remove(tool_name);
                } else {
                    return CheckResult { allowed: true, approval: Some(a.clone()), reason: None };
                }
            }
        }

        inner.session.retain(|a| !a.expired(now));
        if let Some(a) = inner
            .session
            .iter()
            .find(|a| a.tool_name == tool_name && a.session_id.as_deref() == Some(session_id))
        {
            return CheckResult { allowed: true, approval: Some(a.clone()), reason: None };
        }

        if let Some(target) = target_path {
            let normalized = normalize_path(target);
            inner.folder.retain(|a| !a.expired(now));
            // Longest-prefix wins so a narrower grant shadows a broader one.
            let best = inner
                .folder
                .iter()
                .filter(|a| a.tool_name == tool_name)
                .filter(|a| {
                    a.folder_path
                        .as_deref()
                        .map(|f| normalized.starts_with(f))
                        .unwrap_or(false)
                })
                .max_by_key(|a| a.folder_path.as_deref().map(str::len).unwrap_or(0));
            if let Some(a) = best {
                return CheckResult { allowed: true, approval: Some(a.clone()), reason: None };
            }
        }

        CheckResult::denied("no matching approval")
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    pub fn add_global(&self, tool_name: &str) -> Result<(), PermissionError> {
        if is_terminal_tool(tool_name) {
            return Err(PermissionError::TerminalAutoApprove(tool_name.into()));
        }
        let approval = Approval {
            tool_name: tool_name.to_string(),
            scope: Scope::Global,
            session_id: None,
            folder_path: None,
            granted_at: Utc::now(),
            expires_at: None,
        };
        self.inner
            .lock()
            .unwrap()
            .global
            .insert(tool_name.to_string(), approval.clone());
        self.emit(PermissionEvent::ApprovalAdded(approval));
        Ok(())
    }

    /// Add a session-scoped grant.  Without an explicit `expires_at` the
    /// configured session TTL (if any) applies.
    pub fn add_session(
        &self,
        session_id: &str,
        tool_name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let expires_at = expires_at.or_else(|| self.session_ttl.map(|ttl| Utc::now() + ttl));
        let approval = Approval {
            tool_name: tool_name.to_string(),
            scope: Scope::Session,
            session_id: Some(session_id.to_string()),
            folder_path: None,
            granted_at: Utc::now(),
            expires_at,
        };
        let mut inner = self.inner.lock().unwrap();
        inner
            .session
            .retain(|a| !(a.tool_name == tool_name && a.session_id.as_deref() == Some(session_id)));
        inner.session.push(approval.clone());
        drop(inner);
        self.emit(PermissionEvent::ApprovalAdded(approval));
    }

    pub fn add_folder(
        &self,
        folder_path: &str,
        tool_name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let normalized = normalize_path(folder_path);
        let approval = Approval {
            tool_name: tool_name.to_string(),
            scope: Scope::Folder,
            session_id: None,
            folder_path: Some(normalized.clone()),
            granted_at: Utc::now(),
            expires_at,
        };
        let mut inner = self.inner.lock().unwrap();
        inner
            .folder
            .retain(|a| !(a.tool_name == tool_name && a.folder_path.as_deref() == Some(&normalized)));
        inner.folder.push(approval.clone());
        drop(inner);
        self.emit(PermissionEvent::ApprovalAdded(approval));
    }

    pub fn remove_global(&self, tool_name: &str) {
        if self.inner.lock().unwrap().global.remove(tool_name).is_some() {
            self.emit(PermissionEvent::ApprovalRemoved {
                tool_name: tool_name.into(),
                scope: Scope::Global,
            });
        }
    }

    pub fn remove_session(&self, session_id: &str, tool_name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.session.len();
        inner
            .session
            .retain(|a| !(a.tool_name == tool_name && a.session_id.as_deref() == Some(session_id)));
        let removed = inner.session.len() != before;
        drop(inner);
        if removed {
            self.emit(PermissionEvent::ApprovalRemoved {
                tool_name: tool_name.into(),
                scope: Scope::Session,
            });
        }
    }

    pub fn remove_folder(&self, folder_path: &str, tool_name: &str) {
        let normalized = normalize_path(folder_path);
        let mut inner = self.inner.lock().unwrap();
        let before = inner.folder.len();
        inner
            .folder
            .retain(|a| !(a.tool_name == tool_name && a.folder_path.as_deref() == Some(&normalized)));
        let removed = inner.folder.len() != before;
        drop(inner);
        if removed {
            self.emit(PermissionEvent::ApprovalRemoved {
                tool_name: tool_name.into(),
                scope: Scope::Folder,
            });
        }
    }

    /// Drop every stored approval, defaults included.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.global.clear();
        inner.session.clear();
        inner.folder.clear();
        drop(inner);
        self.emit(PermissionEvent::ApprovalsCleared);
    }

    // ── Pending requests ──────────────────────────────────────────────────────

    /// Register a pending approval request and return the receiver the
    /// caller blocks on.  Resolved by [`approve`](Self::approve) or
    /// [`deny`](Self::deny) from the control channel.
    pub fn request(&self, request: PendingRequest) -> oneshot::Receiver<PermissionDecision> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.contains_key(&request.tool_use_id) {
            warn!(tool_use_id = %request.tool_use_id, "replacing duplicate pending permission request");
        }
        inner.pending.insert(
            request.tool_use_id.clone(),
            PendingEntry { request, responder: tx },
        );
        rx
    }

    /// Pending requests awaiting a decision, for UI display.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.inner
            .lock()
            .unwrap()
            .pending
            .values()
            .map(|e| e.request.clone())
            .collect()
    }

    /// Approve a pending request.  `Session`/`Folder` scopes additionally
    /// record a persistent approval; `Once` leaves no record.
    pub fn approve(
        &self,
        tool_use_id: &str,
        scope: Scope,
        folder_path: Option<&str>,
    ) -> Result<(), PermissionError> {
        let entry = self
            .inner
            .lock()
            .unwrap()
            .pending
            .remove(tool_use_id)
            .ok_or_else(|| PermissionError::UnknownPending(tool_use_id.into()))?;

        match scope {
            Scope::Session => {
                self.add_session(&entry.request.session_id, &entry.request.tool_name, None);
            }
            Scope::Folder => {
                let folder = folder_path.ok_or(PermissionError::MissingFolderPath)?;
                self.add_folder(folder, &entry.request.tool_name, None);
            }
            Scope::Global => {
                // Global grants for terminal tools are rejected; the single
                // invocation is still allowed below.
                if let Err(e) = self.add_global(&entry.request.tool_name) {
                    warn!("{e}; granting once instead");
                }
            }
            Scope::Once => {}
        }

        // Receiver dropped means the session gave up waiting; nothing to do.
        let _ = entry.responder.send(PermissionDecision::Approved { scope });
        Ok(())
    }

    /// Deny a pending request.
    pub fn deny(&self, tool_use_id: &str) -> Result<(), PermissionError> {
        let entry = self
            .inner
            .lock()
            .unwrap()
            .pending
            .remove(tool_use_id)
            .ok_or_else(|| PermissionError::UnknownPending(tool_use_id.into()))?;
        let _ = entry.responder.send(PermissionDecision::Denied);
        Ok(())
    }

    // ── Export / import ───────────────────────────────────────────────────────

    /// Export the durable tiers (folder + global), excluding the default
    /// auto-approved set.
    pub fn export(&self) -> PermissionExport {
        let inner = self.inner.lock().unwrap();
        let mut global: Vec<String> = inner
            .global
            .keys()
            .filter(|t| !DEFAULT_AUTO_APPROVED.contains(&t.as_str()))
            .cloned()
            .collect();
        global.sort();
        PermissionExport { global, folder: inner.folder.clone() }
    }

    /// Merge an export back in.  Terminal tools are skipped with a warning.
    pub fn import(&self, export: PermissionExport) {
        for tool in &export.global {
            if let Err(e) = self.add_global(tool) {
                warn!("skipping import entry: {e}");
            }
        }
        for approval in export.folder {
            if let Some(folder) = approval.folder_path.as_deref() {
                self.add_folder(folder, &approval.tool_name, approval.expires_at);
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    // ── Config wiring ─────────────────────────────────────────────────────────

    #[test]
    fn from_config_seeds_extra_auto_approvals() {
        let config = PermissionConfig {
            auto_approve: vec!["MessageSearch".into(), "FileExists".into()],
            session_approval_ttl_secs: None,
        };
        let p = PermissionService::from_config(&config);
        assert!(p.check("MessageSearch", "s1", None).allowed);
        assert!(p.check("FileExists", "s1", None).allowed);
        // The built-in set is still present.
        assert!(p.check("Read", "s1", None).allowed);
    }

    #[test]
    fn from_config_skips_terminal_tools() {
        let config = PermissionConfig {
            auto_approve: vec!["Bash".into(), "executeCommand".into()],
            session_approval_ttl_secs: None,
        };
        let p = PermissionService::from_config(&config);
        assert!(!p.check("Bash", "s1", None).allowed);
        assert!(!p.check("executeCommand", "s1", None).allowed);
    }

    #[test]
    fn configured_session_ttl_expires_grants() {
        let config = PermissionConfig {
            auto_approve: vec![],
            session_approval_ttl_secs: Some(0),
        };
        let p = PermissionService::from_config(&config);
        p.add_session("s1", "Write", None);
        // A zero TTL expires the grant by the time it is checked.
        assert!(!p.check("Write", "s1", None).allowed);
    }

    #[test]
    fn explicit_expiry_overrides_the_ttl_default() {
        let config = PermissionConfig {
            auto_approve: vec![],
            session_approval_ttl_secs: Some(0),
        };
        let p = PermissionService::from_config(&config);
        p.add_session("s1", "Write", Some(Utc::now() + Duration::hours(1)));
        assert!(p.check("Write", "s1", None).allowed);
    }

    // ── Defaults & terminal guard ─────────────────────────────────────────────

    #[test]
    fn default_read_only_tools_are_auto_approved() {
        let p = PermissionService::new();
        for tool in ["Read", "Glob", "Grep", "LS", "LSP"] {
            assert!(p.check(tool, "s1", None).allowed, "{tool} should be auto-approved");
        }
    }

    #[test]
    fn terminal_tools_are_never_auto_approved() {
        let p = PermissionService::new();
        assert!(!p.check("Bash", "s1", None).allowed);
        assert!(!p.check("Spawn", "s1", None).allowed);
    }

    #[test]
    fn add_global_rejects_terminal_tools() {
        let p = PermissionService::new();
        assert!(p.add_global("Bash").is_err());
        assert!(!p.check("Bash", "s1", None).allowed);
    }

    #[test]
    fn session_grant_allows_terminal_tool_in_that_session_only() {
        let p = PermissionService::new();
        p.add_session("s1", "Bash", None);
        assert!(p.check("Bash", "s1", None).allowed);
        assert!(!p.check("Bash", "s2", None).allowed);
    }

    #[test]
    fn global_grant_never_applies_to_terminal_tools() {
        // Even a record sneaked into the global tier is skipped for
        // terminal tools.
        let p = PermissionService::new();
        p.add_session("other", "Bash", None);
        assert!(!p.check("Bash", "s1", None).allowed);
    }

    // ── Session scope ─────────────────────────────────────────────────────────

    #[test]
    fn session_approval_only_matches_its_session() {
        let p = PermissionService::new();
        p.add_session("s1", "Write", None);
        assert!(p.check("Write", "s1", None).allowed);
        assert!(!p.check("Write", "s2", None).allowed);
    }

    #[test]
    fn expired_session_approval_is_removed_on_check() {
        let p = PermissionService::new();
        p.add_session("s1", "Write", Some(Utc::now() - Duration::seconds(1)));
        assert!(!p.check("Write", "s1", None).allowed);
        // The expired entry was dropped, not just skipped.
        assert!(!p.check("Write", "s1", None).allowed);
    }

    // ── Folder scope ──────────────────────────────────────────────────────────

    #[test]
    fn folder_approval_matches_by_prefix() {
        let p = PermissionService::new();
        p.add_folder("/home/user/project", "Edit", None);
        assert!(p.check("Edit", "s1", Some("/home/user/project/src/main.rs")).allowed);
        assert!(!p.check("Edit", "s1", Some("/home/user/other/file.rs")).allowed);
    }

    #[test]
    fn folder_prefix_does_not_match_sibling_with_common_stem() {
        let p = PermissionService::new();
        p.add_folder("/a/b", "Edit", None);
        // Without trailing-slash normalization "/a/bc" would match "/a/b".
        assert!(!p.check("Edit", "s1", Some("/a/bc/file.rs")).allowed);
    }

    #[test]
    fn longest_folder_prefix_wins() {
        let p = PermissionService::new();
        p.add_folder("/a", "Edit", None);
        p.add_folder("/a/b", "Edit", None);
        let r = p.check("Edit", "s1", Some("/a/b/c.rs"));
        assert!(r.allowed);
        assert_eq!(r.approval.unwrap().folder_path.as_deref(), Some("/a/b/"));
    }

    #[test]
    fn check_without_target_ignores_folder_grants() {
        let p = PermissionService::new();
        p.add_folder("/a", "Edit", None);
        assert!(!p.check("Edit", "s1", None).allowed);
    }

    // ── Path normalization ────────────────────────────────────────────────────

    #[test]
    fn normalize_converts_backslashes_and_appends_slash() {
        assert_eq!(normalize_path("C:\\Users\\dev"), "C:/Users/dev/");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_path("/a/b");
        assert_eq!(normalize_path(&once), once);
    }

    // ── Pending requests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn approve_once_resolves_without_record() {
        let p = PermissionService::new();
        let rx = p.request(PendingRequest::new("tu-1", "Bash", "s1"));
        p.approve("tu-1", Scope::Once, None).unwrap();
        let decision = rx.await.unwrap();
        assert!(matches!(decision, PermissionDecision::Approved { scope: Scope::Once }));
        // No durable record.
        assert!(!p.check("Bash", "s1", None).allowed);
    }

    #[tokio::test]
    async fn approve_session_records_approval() {
        let p = PermissionService::new();
        let rx = p.request(PendingRequest::new("tu-1", "Write", "s1"));
        p.approve("tu-1", Scope::Session, None).unwrap();
        assert!(matches!(rx.await.unwrap(), PermissionDecision::Approved { .. }));
        assert!(p.check("Write", "s1", None).allowed);
        assert!(!p.check("Write", "s2", None).allowed);
    }

    #[tokio::test]
    async fn approve_folder_requires_path() {
        let p = PermissionService::new();
        let _rx = p.request(PendingRequest::new("tu-1", "Edit", "s1"));
        assert!(matches!(
            p.approve("tu-1", Scope::Folder, None),
            Err(PermissionError::MissingFolderPath)
        ));
    }

    #[tokio::test]
    async fn deny_resolves_with_denied() {
        let p = PermissionService::new();
        let rx = p.request(PendingRequest::new("tu-1", "Bash", "s1"));
        p.deny("tu-1").unwrap();
        assert!(matches!(rx.await.unwrap(), PermissionDecision::Denied));
    }

    #[test]
    fn approve_unknown_pending_is_an_error() {
        let p = PermissionService::new();
        assert!(matches!(
            p.approve("nope", Scope::Once, None),
            Err(PermissionError::UnknownPending(_))
        ));
    }

    // ── Events ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_and_remove_emit_events() {
        let p = PermissionService::new();
        let mut rx = p.subscribe();
        p.add_session("s1", "Write", None);
        assert!(matches!(rx.recv().await.unwrap(), PermissionEvent::ApprovalAdded(_)));
        p.remove_session("s1", "Write");
        assert!(matches!(
            rx.recv().await.unwrap(),
            PermissionEvent::ApprovalRemoved { scope: Scope::Session, .. }
        ));
    }

    // ── Export / import ───────────────────────────────────────────────────────

    #[test]
    fn export_excludes_defaults_and_session_grants() {
        let p = PermissionService::new();
        p.add_global("MyCustomTool").unwrap();
        p.add_session("s1", "Write", None);
        p.add_folder("/proj", "Edit", None);
        let export = p.export();
        assert_eq!(export.global, vec!["MyCustomTool".to_string()]);
        assert_eq!(export.folder.len(), 1);
        assert_eq!(export.folder[0].tool_name, "Edit");
    }

    #[test]
    fn export_import_round_trip() {
        let p = PermissionService::new();
        p.add_global("MyCustomTool").unwrap();
        p.add_folder("/proj", "Edit", None);
        let export = p.export();

        let q = PermissionService::new();
        q.import(export);
        assert!(q.check("MyCustomTool", "any", None).allowed);
        assert!(q.check("Edit", "any", Some("/proj/src/lib.rs")).allowed);
    }

    #[test]
    fn json_round_trip_of_export() {
        let p = PermissionService::new();
        p.add_folder("/proj", "Edit", None);
        let json = serde_json::to_string(&p.export()).unwrap();
        let back: PermissionExport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.folder.len(), 1);
    }
}
