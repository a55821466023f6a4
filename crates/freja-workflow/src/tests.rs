// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end scheduler scenarios, driven with scripted providers and the
//! in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::json;

use freja_agents::{AgentDef, AgentRegistry};
use freja_config::{SessionConfig, WorkflowConfig};
use freja_ecp::MockEcp;
use freja_model::{
    ChatRequest, EventStream, MockProvider, Provider, ScriptedProvider, StopReason, StreamEvent,
    Usage,
};
use freja_panel::{PanelConfig, ReviewPanelService, ReviewerSpec, VotingThresholds};
use freja_permissions::PermissionService;
use freja_session::{ProviderFactory, SessionManager};
use freja_state::{
    ExecutionStatus, MemoryStore, MessageRole, NodeExecutionStatus, StateStore,
};
use freja_tools::{translator_for, ToolExecutor};

use crate::notify::WorkflowNotification;
use crate::step::{Branches, MergeStrategy, StepType, Workflow, WorkflowStep};
use crate::{StepProgress, WorkflowExecutor};

// ── Harness ───────────────────────────────────────────────────────────────────

struct FixedFactory(Option<Arc<dyn Provider>>);

impl ProviderFactory for FixedFactory {
    fn provider(&self, _provider_id: &str, _model: &str) -> Option<Arc<dyn Provider>> {
        self.0.clone()
    }
}

/// Picks its reply by substring match on the request's system prompt, so
/// concurrent reviewer sessions stay deterministic.  Falls back to echoing
/// the last user message.
struct KeyedProvider {
    replies: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl Provider for KeyedProvider {
    fn id(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "keyed-mock"
    }

    async fn chat_stream(&self, req: ChatRequest) -> anyhow::Result<EventStream> {
        let system = req.system_prompt.unwrap_or_default();
        let reply = self
            .replies
            .iter()
            .find(|(needle, _)| system.contains(needle))
            .map(|(_, reply)| reply.to_string())
            .unwrap_or_else(|| {
                req.messages
                    .iter()
                    .rev()
                    .find_map(|m| m.as_text())
                    .unwrap_or("[no input]")
                    .to_string()
            });
        let events: Vec<anyhow::Result<StreamEvent>> = vec![
            Ok(StreamEvent::TextDelta(reply)),
            Ok(StreamEvent::MessageEnd {
                stop_reason: StopReason::EndTurn,
                usage: Usage { input_tokens: 7, output_tokens: 3 },
            }),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

struct Harness {
    executor: Arc<WorkflowExecutor>,
    store: Arc<MemoryStore>,
    agents: Arc<AgentRegistry>,
    #[allow(dead_code)]
    ecp: Arc<MockEcp>,
}

fn harness(provider: Option<Arc<dyn Provider>>) -> Harness {
    harness_with_config(provider, WorkflowConfig::default())
}

fn harness_with_config(provider: Option<Arc<dyn Provider>>, config: WorkflowConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let store_dyn: Arc<dyn StateStore> = store.clone();
    let permissions = Arc::new(PermissionService::new());
    let ecp = Arc::new(MockEcp::new());
    let tools = Arc::new(ToolExecutor::new(ecp.clone(), translator_for("claude")));
    let agents = Arc::new(AgentRegistry::new());
    let sessions = Arc::new(SessionManager::new(
        Arc::new(FixedFactory(provider)),
        permissions,
        tools,
        Arc::clone(&agents),
        SessionConfig::default(),
    ));
    let panels = Arc::new(ReviewPanelService::new(Arc::clone(&store_dyn)));
    let executor = Arc::new(WorkflowExecutor::new(
        store_dyn,
        sessions,
        Arc::clone(&agents),
        panels,
        config,
    ));
    Harness { executor, store, agents, ecp }
}

fn echo_harness() -> Harness {
    harness(Some(Arc::new(MockProvider)))
}

fn linear_workflow() -> Workflow {
    Workflow::new(
        "wf-linear",
        "linear chain",
        vec![
            WorkflowStep::agent("a", "assistant"),
            WorkflowStep::agent("b", "assistant").with_depends(&["a"]),
            WorkflowStep::agent("c", "assistant").with_depends(&["b"]),
        ],
    )
}

// ── Composition root ──────────────────────────────────────────────────────────

#[tokio::test]
async fn from_config_builds_a_working_stack() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("freja.yaml");
    std::fs::write(
        &path,
        "workflow:\n  max_handoff_depth: 2\n\
         permissions:\n  auto_approve:\n    - MessageSearch\n",
    )
    .unwrap();
    let config = freja_config::load_config(&path).unwrap();
    assert_eq!(config.workflow.max_handoff_depth, 2);

    let executor = WorkflowExecutor::from_config(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(FixedFactory(Some(Arc::new(MockProvider)))),
        Arc::new(MockEcp::new()),
    );

    // The configured auto-approval reached the permission service.
    let permissions = executor.sessions().permissions();
    assert!(permissions.check("MessageSearch", "any-session", None).allowed);
    assert!(!permissions.check("Bash", "any-session", None).allowed);

    // And the assembled stack runs a workflow end to end.
    executor.register_workflow(linear_workflow()).unwrap();
    let exec = executor.start_execution("wf-linear", json!("ok")).await.unwrap();
    let finished = executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
}

// ── Scenario: linear chain ────────────────────────────────────────────────────

#[tokio::test]
async fn linear_chain_runs_three_nodes_in_order() {
    let h = echo_harness();
    h.executor.register_workflow(linear_workflow()).unwrap();
    let exec = h.executor.start_execution("wf-linear", json!("ok")).await.unwrap();

    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert_eq!(finished.iteration_count, 0);

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    let ids: Vec<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(nodes.iter().all(|n| n.status == NodeExecutionStatus::Completed));
    assert!(nodes.iter().all(|n| n.tokens_in > 0 && n.tokens_out > 0));
    // Completion order is total under (iteration, started_at).
    for pair in nodes.windows(2) {
        assert!(pair[0].started_at <= pair[1].started_at);
    }
}

#[tokio::test]
async fn linear_chain_emits_lifecycle_notifications() {
    let h = echo_harness();
    h.executor.register_workflow(linear_workflow()).unwrap();
    let mut rx = h.executor.notifier().subscribe();

    let exec = h.executor.start_execution("wf-linear", json!("go")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap();

    let mut phases = Vec::new();
    while let Ok(n) = rx.try_recv() {
        if let WorkflowNotification::Activity { phase, .. } = n {
            phases.push(phase);
        }
    }
    assert!(phases.contains(&"execution_started".to_string()));
    assert!(phases.contains(&"node_started".to_string()));
    assert!(phases.contains(&"node_completed".to_string()));
    assert!(phases.contains(&"execution_completed".to_string()));
}

// ── Scenario: conversation loop ───────────────────────────────────────────────

#[tokio::test]
async fn conversation_loop_pauses_and_resumes_with_new_iteration() {
    let h = echo_harness();
    h.executor
        .register_workflow(Workflow::new(
            "wf-chat",
            "conversation",
            vec![
                WorkflowStep::agent("respond", "assistant"),
                WorkflowStep::new("wait", StepType::AwaitInput).with_depends(&["respond"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-chat", json!("Hi")).await.unwrap();

    // Two steps: agent answers, await_input parks the execution.
    assert!(matches!(
        h.executor.execute_step(&exec.id).await.unwrap(),
        StepProgress::Ran { .. }
    ));
    assert!(matches!(
        h.executor.execute_step(&exec.id).await.unwrap(),
        StepProgress::Paused
    ));
    let paused = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(paused.status, ExecutionStatus::AwaitingInput);

    // User replies; resume starts iteration 1 back at the first step.
    h.executor.record_user_input(&exec.id, "again", 1).await.unwrap();
    let resumed = h.executor.resume_after_input(&exec.id).await.unwrap();
    assert_eq!(resumed.status, ExecutionStatus::Running);
    assert_eq!(resumed.iteration_count, 1);
    assert_eq!(resumed.current_node_id.as_deref(), Some("respond"));

    assert!(matches!(
        h.executor.execute_step(&exec.id).await.unwrap(),
        StepProgress::Ran { .. }
    ));

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    let second_round: Vec<_> = nodes
        .iter()
        .filter(|n| n.node_id == "respond" && n.iteration_number == 1)
        .collect();
    assert_eq!(second_round.len(), 1);
    // The echo provider answered the NEW user message.
    assert_eq!(second_round[0].output, Some(json!("again")));

    let final_exec = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(final_exec.iteration_count, 1);
}

// ── Scenario: review panels ───────────────────────────────────────────────────

fn register_reviewers(agents: &AgentRegistry) {
    for (id, needle) in [
        ("sec", "SEC_REVIEWER"),
        ("style", "STYLE_REVIEWER"),
        ("correct", "CORRECT_REVIEWER"),
    ] {
        let mut agent = AgentDef::new(id, "claude-sonnet-4-5");
        agent.id = id.to_string();
        agent.system_prompt = format!("You are {needle}.");
        agents.create(agent);
    }
}

fn review_workflow(thresholds: VotingThresholds, reviewers: Vec<ReviewerSpec>) -> Workflow {
    let mut panel_step = WorkflowStep::new("panel", StepType::ReviewPanel).with_depends(&["coder"]);
    panel_step.review_question = Some("Review this change.".into());
    panel_step.review_panel = Some(PanelConfig {
        reviewers,
        thresholds,
        ..Default::default()
    });
    Workflow::new(
        "wf-review",
        "cca review",
        vec![
            WorkflowStep::agent("coder", "coder").with_prompt("Implement the fix."),
            panel_step,
        ],
    )
}

#[tokio::test]
async fn cca_panel_approves_and_completes() {
    let provider = KeyedProvider {
        replies: vec![
            ("expert programmer", "patch written"),
            ("SEC_REVIEWER", "VOTE: approve\nFEEDBACK: no security concerns"),
            ("STYLE_REVIEWER", "VOTE: approve\nFEEDBACK: idiomatic"),
            ("CORRECT_REVIEWER", "VOTE: request_changes\nFEEDBACK: off-by-one"),
        ],
    };
    let h = harness(Some(Arc::new(provider)));
    register_reviewers(&h.agents);
    h.executor
        .register_workflow(review_workflow(
            VotingThresholds { approve_threshold: 0.5, ..Default::default() },
            vec![
                ReviewerSpec::new("sec", 2),
                ReviewerSpec::new("style", 1),
                ReviewerSpec::new("correct", 1),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-review", json!("fix the bug")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();

    // 3/4 of the weight approves: 0.75 ≥ 0.5 → approved → complete.
    assert_eq!(finished.status, ExecutionStatus::Completed);

    let panel_node = h
        .store
        .list_node_executions(&exec.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.node_id == "panel")
        .unwrap();
    let output = panel_node.output.unwrap();
    assert_eq!(output["outcome"], "approved");
    assert!(output["summary"].as_str().unwrap().contains("approve 3/4"));
}

#[tokio::test]
async fn critical_vote_loops_back_to_coder() {
    let provider = KeyedProvider {
        replies: vec![
            ("expert programmer", "patch written"),
            ("SEC_REVIEWER", "VOTE: approve\nFEEDBACK: fine"),
            ("STYLE_REVIEWER", "VOTE: critical\nFEEDBACK: hardcoded secret"),
        ],
    };
    let h = harness(Some(Arc::new(provider)));
    register_reviewers(&h.agents);
    h.executor
        .register_workflow(review_workflow(
            VotingThresholds { approve_threshold: 0.5, ..Default::default() },
            vec![ReviewerSpec::new("sec", 10), ReviewerSpec::new("style", 1)],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-review", json!("fix")).await.unwrap();

    // coder runs, then the panel: critical blocks despite the weights.
    h.executor.execute_step(&exec.id).await.unwrap();
    let progress = h.executor.execute_step(&exec.id).await.unwrap();
    assert!(matches!(progress, StepProgress::Ran { ref node_id } if node_id == "panel"));

    let after = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(after.status, ExecutionStatus::Running);
    assert_eq!(after.current_node_id.as_deref(), Some("coder"));
    assert_eq!(after.iteration_count, 1, "loop outcome starts a new iteration");

    let panel_node = h
        .store
        .list_node_executions(&exec.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.node_id == "panel")
        .unwrap();
    assert_eq!(panel_node.output.unwrap()["outcome"], "address_critical");
}

#[tokio::test]
async fn queue_changes_outcome_enqueues_feedback() {
    let provider = KeyedProvider {
        replies: vec![
            ("expert programmer", "patch written"),
            (
                "SEC_REVIEWER",
                "VOTE: request_changes\nFEEDBACK: tidy up\n\
                 ISSUES: [{\"severity\": \"minor\", \"description\": \"rename the helper\"}]",
            ),
            ("STYLE_REVIEWER", "VOTE: request_changes\nFEEDBACK: naming"),
        ],
    };
    let h = harness(Some(Arc::new(provider)));
    register_reviewers(&h.agents);
    h.executor
        .register_workflow(review_workflow(
            VotingThresholds::default(),
            vec![ReviewerSpec::new("sec", 1), ReviewerSpec::new("style", 1)],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-review", json!("fix")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap();

    let feedback = h.store.list_feedback(&exec.id).await.unwrap();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].status, freja_state::FeedbackStatus::Queued);
    assert_eq!(feedback[0].surface_trigger, freja_state::SurfaceTrigger::IterationEnd);

    let items = h.store.list_context_items(&exec.id).await.unwrap();
    assert!(items.iter().any(|i| {
        i.item_type == freja_state::ContextItemType::Feedback
            && i.content.contains("rename the helper")
    }));
}

// ── Decision nodes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn decision_approve_completes_workflow() {
    let h = harness(Some(Arc::new(ScriptedProvider::always_text(
        "Looks good overall.\nVOTE: approve",
    ))));
    h.executor
        .register_workflow(Workflow::new(
            "wf-decision",
            "decision",
            vec![
                WorkflowStep::agent("worker", "assistant"),
                WorkflowStep::new("tally", StepType::Decision).with_depends(&["worker"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-decision", json!("review")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);

    // The tally posts a system summary message.
    let messages = h.store.list_messages(&exec.id).await.unwrap();
    assert!(messages
        .iter()
        .any(|m| m.role == MessageRole::System && m.content.contains("Decision: approve")));
}

#[tokio::test]
async fn decision_all_critical_escalates_to_checkpoint() {
    let h = harness(Some(Arc::new(ScriptedProvider::always_text(
        "Broken build.\nVOTE: critical",
    ))));
    h.executor
        .register_workflow(Workflow::new(
            "wf-decision",
            "decision",
            vec![
                WorkflowStep::agent("worker", "assistant"),
                WorkflowStep::new("tally", StepType::Vote).with_depends(&["worker"]),
                WorkflowStep::new("gate", StepType::Checkpoint).with_depends(&["tally"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-decision", json!("review")).await.unwrap();
    h.executor.execute_step(&exec.id).await.unwrap(); // worker
    h.executor.execute_step(&exec.id).await.unwrap(); // tally

    // A single critical vote is 100% critical → escalate to the checkpoint.
    let after = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(after.current_node_id.as_deref(), Some("gate"));
}

// ── Split / merge ─────────────────────────────────────────────────────────────

fn diamond_workflow(strategy: MergeStrategy) -> Workflow {
    let mut merge = WorkflowStep::new("join", StepType::Merge).with_depends(&["left", "right"]);
    merge.merge_strategy = Some(strategy);
    Workflow::new(
        "wf-diamond",
        "diamond",
        vec![
            WorkflowStep::new("fan", StepType::Split),
            WorkflowStep::agent("left", "assistant").with_depends(&["fan"]).with_prompt("left task"),
            WorkflowStep::agent("right", "assistant").with_depends(&["fan"]).with_prompt("right task"),
            merge,
        ],
    )
}

#[tokio::test]
async fn wait_all_merge_collects_both_branches() {
    let h = echo_harness();
    h.executor.register_workflow(diamond_workflow(MergeStrategy::WaitAll)).unwrap();
    let exec = h.executor.start_execution("wf-diamond", json!("start")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);

    let join = h
        .store
        .list_node_executions(&exec.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.node_id == "join")
        .unwrap();
    let output = join.output.unwrap();
    assert!(output.get("left").is_some());
    assert!(output.get("right").is_some());
}

#[tokio::test]
async fn parallel_branches_via_find_ready_and_execute_parallel() {
    let h = echo_harness();
    h.executor.register_workflow(diamond_workflow(MergeStrategy::WaitAll)).unwrap();
    let exec = h.executor.start_execution("wf-diamond", json!("start")).await.unwrap();

    // Run the split, then fan the branches out concurrently.
    h.executor.execute_step(&exec.id).await.unwrap();
    let ready = h.executor.find_all_ready_nodes(&exec.id).await.unwrap();
    assert_eq!(ready, vec!["left".to_string(), "right".to_string()]);

    h.executor.execute_parallel(&exec.id, &ready).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    assert!(nodes.iter().any(|n| n.node_id == "join"));
}

#[tokio::test]
async fn wait_any_merge_uses_first_completed_branch() {
    let h = echo_harness();
    let mut merge = WorkflowStep::new("join", StepType::Merge).with_depends(&["a", "b"]);
    merge.merge_strategy = Some(MergeStrategy::WaitAny);
    h.executor
        .register_workflow(Workflow::new(
            "wf-any",
            "wait any",
            vec![
                WorkflowStep::agent("a", "assistant").with_prompt("alpha"),
                merge,
                WorkflowStep::agent("b", "assistant").with_prompt("beta"),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-any", json!("go")).await.unwrap();
    h.executor.execute_step(&exec.id).await.unwrap(); // a
    let progress = h.executor.execute_step(&exec.id).await.unwrap();
    assert!(matches!(progress, StepProgress::Ran { ref node_id } if node_id == "join"));

    let join = h
        .store
        .list_node_executions(&exec.id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.node_id == "join")
        .unwrap();
    // a's output, not an object of both.
    assert!(join.output.unwrap().is_string());
}

// ── Condition branching ───────────────────────────────────────────────────────

#[tokio::test]
async fn condition_takes_true_branch_and_skips_false() {
    let h = echo_harness();
    let mut cond = WorkflowStep::new("check", StepType::Condition);
    cond.branches = Some(Branches {
        on_true: Some("yes".into()),
        on_false: Some("no".into()),
    });
    h.executor
        .register_workflow(Workflow::new(
            "wf-cond",
            "condition",
            vec![
                cond,
                WorkflowStep::agent("yes", "assistant").with_depends(&["check"]),
                WorkflowStep::agent("no", "assistant").with_depends(&["check"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-cond", json!("truthy input")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    let yes = nodes.iter().find(|n| n.node_id == "yes").unwrap();
    assert_eq!(yes.status, NodeExecutionStatus::Completed);
    let no = nodes.iter().find(|n| n.node_id == "no").unwrap();
    assert_eq!(no.status, NodeExecutionStatus::Skipped);
}

#[tokio::test]
async fn condition_id_convention_fallback() {
    let h = echo_harness();
    h.executor
        .register_workflow(Workflow::new(
            "wf-cond2",
            "condition by naming",
            vec![
                WorkflowStep::new("check", StepType::Condition),
                WorkflowStep::agent("on_true_path", "assistant").with_depends(&["check"]),
                WorkflowStep::agent("on_false_path", "assistant").with_depends(&["check"]),
            ],
        ))
        .unwrap();

    // Empty-string input is falsy → the "false" branch runs.
    let exec = h.executor.start_execution("wf-cond2", json!("")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap();

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    assert_eq!(
        nodes.iter().find(|n| n.node_id == "on_false_path").unwrap().status,
        NodeExecutionStatus::Completed
    );
    assert_eq!(
        nodes.iter().find(|n| n.node_id == "on_true_path").unwrap().status,
        NodeExecutionStatus::Skipped
    );
}

// ── Checkpoints ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn checkpoint_pauses_until_human_decision() {
    let h = echo_harness();
    h.executor
        .register_workflow(Workflow::new(
            "wf-gate",
            "gated",
            vec![
                WorkflowStep::agent("draft", "assistant"),
                WorkflowStep::new("approve", StepType::Checkpoint).with_depends(&["draft"]),
                WorkflowStep::agent("publish", "assistant").with_depends(&["approve"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-gate", json!("draft it")).await.unwrap();
    let paused = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(paused.status, ExecutionStatus::AwaitingInput);

    let pending = h.store.pending_checkpoints(&exec.id).await.unwrap();
    assert_eq!(pending.len(), 1);

    h.executor
        .resume_after_checkpoint(&exec.id, &pending[0].id, "approve", Some("ship it"))
        .await
        .unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    assert!(nodes
        .iter()
        .any(|n| n.node_id == "publish" && n.status == NodeExecutionStatus::Completed));
    let checkpoint = h.store.get_checkpoint(&pending[0].id).await.unwrap();
    assert_eq!(checkpoint.decision.as_deref(), Some("approve"));
}

// ── Handoffs ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn handoff_injects_dynamic_node_for_target_agent() {
    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::tool_use_script(
            "h1",
            "DelegateToAgent",
            r#"{"agentId":"architect","message":"design the schema","context":"greenfield"}"#,
        ),
        ScriptedProvider::text_script("delegating now"),
        ScriptedProvider::text_script("architecture ready"),
    ]);
    let h = harness(Some(Arc::new(provider)));
    h.executor
        .register_workflow(Workflow::new(
            "wf-handoff",
            "handoff",
            vec![WorkflowStep::agent("lead", "coder").with_prompt("build it")],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-handoff", json!("start")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    let dynamic = nodes
        .iter()
        .find(|n| n.node_id.starts_with("handoff-"))
        .expect("dynamic handoff node should have executed");
    assert!(dynamic.node_id.ends_with("-architect"));
    assert_eq!(dynamic.status, NodeExecutionStatus::Completed);
    assert_eq!(dynamic.output, Some(json!("architecture ready")));

    // The handoff context was recorded for the target.
    let items = h.store.list_context_items(&exec.id).await.unwrap();
    assert!(items
        .iter()
        .any(|i| i.content.contains("Handoff context for architect")));
}

#[tokio::test]
async fn handoff_depth_limit_blocks_delegation() {
    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::tool_use_script(
            "h1",
            "DelegateToAgent",
            r#"{"agentId":"architect","message":"design it"}"#,
        ),
        ScriptedProvider::text_script("done without delegating"),
    ]);
    let config = WorkflowConfig { max_handoff_depth: 0, ..Default::default() };
    let h = harness_with_config(Some(Arc::new(provider)), config);
    h.executor
        .register_workflow(Workflow::new(
            "wf-depth",
            "depth limited",
            vec![WorkflowStep::agent("lead", "coder")],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-depth", json!("start")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();

    // The delegation is silently ignored and the workflow completes.
    assert_eq!(finished.status, ExecutionStatus::Completed);
    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    assert!(nodes.iter().all(|n| !n.node_id.starts_with("handoff-")));
}

#[tokio::test]
async fn handoff_to_unknown_agent_is_ignored() {
    let provider = ScriptedProvider::new(vec![
        ScriptedProvider::tool_use_script(
            "h1",
            "DelegateToAgent",
            r#"{"agentId":"nobody","message":"do it"}"#,
        ),
        ScriptedProvider::text_script("continuing alone"),
    ]);
    let h = harness(Some(Arc::new(provider)));
    h.executor
        .register_workflow(Workflow::new(
            "wf-handoff2",
            "handoff",
            vec![WorkflowStep::agent("lead", "coder")],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-handoff2", json!("start")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    assert!(nodes.iter().all(|n| !n.node_id.starts_with("handoff-")));
}

// ── Cross-iteration context ───────────────────────────────────────────────────

#[tokio::test]
async fn later_iterations_see_other_agents_earlier_output() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ScriptedProvider::text_script("a first"),
        ScriptedProvider::text_script("b first"),
        ScriptedProvider::text_script("a second"),
    ]));
    let h = harness(Some(provider.clone()));
    h.executor
        .register_workflow(Workflow::new(
            "wf-ctx",
            "cross iteration context",
            vec![
                WorkflowStep::agent("a", "coder"),
                WorkflowStep::agent("b", "assistant").with_depends(&["a"]),
                WorkflowStep::new("wait", StepType::AwaitInput).with_depends(&["b"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-ctx", json!("kick off")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap(); // iteration 0, pauses

    h.executor.record_user_input(&exec.id, "next round", 1).await.unwrap();
    h.executor.resume_after_input(&exec.id).await.unwrap();
    h.executor.execute_step(&exec.id).await.unwrap(); // a again, iteration 1

    let request = provider.last_request.lock().unwrap().clone().unwrap();
    let last_user = request
        .messages
        .iter()
        .rev()
        .find_map(|m| m.as_text())
        .unwrap()
        .to_string();
    assert!(last_user.contains("## Context from earlier iterations"));
    assert!(last_user.contains("[assistant] b first"));
    assert!(last_user.contains("next round"));
    // The agent's own earlier output is not replayed – its session history
    // already carries it.
    assert!(!last_user.contains("[coder] a first"));
}

// ── Output node & pass-throughs ───────────────────────────────────────────────

#[tokio::test]
async fn output_node_records_final_output() {
    let h = echo_harness();
    h.executor
        .register_workflow(Workflow::new(
            "wf-out",
            "with output",
            vec![
                WorkflowStep::agent("a", "assistant"),
                WorkflowStep::new("result", StepType::Output).with_depends(&["a"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-out", json!("final answer")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert_eq!(finished.final_output, Some(json!("final answer")));
}

#[tokio::test]
async fn pass_through_nodes_forward_input() {
    let h = echo_harness();
    h.executor
        .register_workflow(Workflow::new(
            "wf-pass",
            "plumbing",
            vec![
                WorkflowStep::new("t", StepType::Trigger),
                WorkflowStep::agent("a", "assistant").with_depends(&["t"]),
                WorkflowStep::new("r", StepType::Router).with_depends(&["a"]),
                WorkflowStep::new("x", StepType::Transform).with_depends(&["r"]),
                WorkflowStep::new("gate", StepType::PermissionGate).with_depends(&["x"]),
                WorkflowStep::new("out", StepType::Output).with_depends(&["gate"]),
            ],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-pass", json!("payload")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    // The echo agent answered "payload" and it flowed through unchanged.
    assert_eq!(finished.final_output, Some(json!("payload")));
}

// ── Failure & cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn provider_unavailable_fails_the_execution() {
    let h = harness(None);
    h.executor.register_workflow(linear_workflow()).unwrap();
    let exec = h.executor.start_execution("wf-linear", json!("go")).await.unwrap();

    let err = h.executor.run(&exec.id).await.unwrap_err();
    assert!(err.to_string().contains("provider not available"));

    let failed = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert!(failed.error_message.unwrap().contains("provider not available"));

    let nodes = h.store.list_node_executions(&exec.id).await.unwrap();
    assert_eq!(nodes[0].status, NodeExecutionStatus::Failed);
}

#[tokio::test]
async fn unknown_step_agent_falls_back_to_assistant() {
    let h = echo_harness();
    h.executor
        .register_workflow(Workflow::new(
            "wf-ghost",
            "ghost agent",
            vec![WorkflowStep::agent("a", "ghost-agent-42")],
        ))
        .unwrap();
    let exec = h.executor.start_execution("wf-ghost", json!("hello")).await.unwrap();
    let finished = h.executor.run(&exec.id).await.unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn cancelled_execution_rejects_further_steps() {
    let h = echo_harness();
    h.executor.register_workflow(linear_workflow()).unwrap();
    let exec = h.executor.start_execution("wf-linear", json!("go")).await.unwrap();

    h.executor.execute_step(&exec.id).await.unwrap();
    h.executor.cancel_execution(&exec.id).await.unwrap();

    let cancelled = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
    assert!(h.executor.execute_step(&exec.id).await.is_err());
}

#[tokio::test]
async fn iteration_limit_fails_the_execution() {
    let h = echo_harness();
    let mut wf = Workflow::new(
        "wf-limit",
        "bounded",
        vec![
            WorkflowStep::agent("respond", "assistant"),
            WorkflowStep::new("wait", StepType::AwaitInput).with_depends(&["respond"]),
        ],
    );
    wf.max_iterations = 1;
    h.executor.register_workflow(wf).unwrap();

    let exec = h.executor.start_execution("wf-limit", json!("Hi")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap(); // pauses at await_input
    h.executor.resume_after_input(&exec.id).await.unwrap(); // iteration 1
    h.executor.run(&exec.id).await.unwrap(); // pauses again

    // The second resume would exceed max_iterations.
    let err = h.executor.resume_after_input(&exec.id).await.unwrap_err();
    assert!(err.to_string().contains("maximum iterations"));
    let failed = h.store.get_execution(&exec.id).await.unwrap();
    assert_eq!(failed.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn delete_execution_cascades_records() {
    let h = echo_harness();
    h.executor.register_workflow(linear_workflow()).unwrap();
    let exec = h.executor.start_execution("wf-linear", json!("go")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap();

    h.executor.delete_execution(&exec.id).await.unwrap();
    assert!(h.store.get_execution(&exec.id).await.is_err());
    assert!(h.store.list_node_executions(&exec.id).await.unwrap().is_empty());
    assert!(h.store.list_messages(&exec.id).await.unwrap().is_empty());
}

// ── Streaming message persistence ─────────────────────────────────────────────

#[tokio::test]
async fn agent_node_persists_per_iteration_messages() {
    let provider = ScriptedProvider::new(vec![
        {
            // A tool round with some visible thinking text first.
            let mut script =
                vec![StreamEvent::TextDelta("Let me look at the file.".into())];
            script.extend(ScriptedProvider::tool_use_script(
                "t1",
                "Read",
                r#"{"file_path":"a.rs"}"#,
            ));
            script
        },
        ScriptedProvider::text_script("The file looks fine."),
    ]);
    let h = harness(Some(Arc::new(provider)));
    h.executor
        .register_workflow(Workflow::new(
            "wf-stream",
            "stream",
            vec![WorkflowStep::agent("a", "assistant")],
        ))
        .unwrap();

    let exec = h.executor.start_execution("wf-stream", json!("check a.rs")).await.unwrap();
    h.executor.run(&exec.id).await.unwrap();

    let messages = h.store.list_messages(&exec.id).await.unwrap();
    let agent_messages: Vec<_> = messages
        .iter()
        .filter(|m| m.role == MessageRole::Agent)
        .collect();
    assert_eq!(agent_messages.len(), 2, "one tool-use round plus the final answer");

    let tool_round = agent_messages[0];
    assert!(tool_round.is_complete);
    assert!(tool_round.is_tool_use_iteration);
    assert!(!tool_round.is_final_iteration);
    assert_eq!(tool_round.content, "Let me look at the file.");

    let final_round = agent_messages[1];
    assert!(final_round.is_complete);
    assert!(final_round.is_final_iteration);
    assert_eq!(final_round.content, "The file looks fine.");

    // Only the final content became prompt context for later agents.
    let items = h.store.list_context_items(&exec.id).await.unwrap();
    let outputs: Vec<_> = items
        .iter()
        .filter(|i| i.item_type == freja_state::ContextItemType::AgentOutput)
        .collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].content, "The file looks fine.");

    // The invocation left an audit row.
    let calls = h.store.list_tool_calls(&exec.id).await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "Read");
    assert!(calls[0].success);
    assert_eq!(calls[0].arguments["file_path"], "a.rs");
}
