// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use freja_state::{ReviewPanelRecord, StateStore, VoteRecord};

use crate::aggregate::{aggregate, PanelSummary, VoteEntry};
use crate::config::{PanelConfig, PanelOutcome, ReviewerSpec, Vote};
use crate::parser::{parse_review_response, Issue};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Runs one reviewer and returns its raw text response.
///
/// The workflow layer implements this on top of the session manager; tests
/// implement it with canned strings.
#[async_trait]
pub trait ReviewerRunner: Send + Sync {
    async fn run_reviewer(&self, reviewer: &ReviewerSpec, question: &str)
        -> anyhow::Result<String>;
}

/// Collects votes, persists panel records, and classifies outcomes.
pub struct ReviewPanelService {
    store: Arc<dyn StateStore>,
}

impl ReviewPanelService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Create and persist a fresh panel record.
    pub async fn start_panel(
        &self,
        execution_id: &str,
        node_execution_id: &str,
        config: &PanelConfig,
    ) -> anyhow::Result<ReviewPanelRecord> {
        let record = ReviewPanelRecord::new(
            execution_id,
            node_execution_id,
            serde_json::to_value(config)?,
        );
        self.store.create_panel(record.clone()).await?;
        Ok(record)
    }

    /// Record one ballot.  A second ballot from the same reviewer replaces
    /// the first.
    pub async fn add_vote(
        &self,
        panel_id: &str,
        reviewer_id: &str,
        vote: Vote,
        feedback: &str,
        issues: Vec<Issue>,
        weight: u32,
    ) -> anyhow::Result<()> {
        let mut record = self.store.get_panel(panel_id).await?;
        record.votes.retain(|v| v.reviewer_id != reviewer_id);
        record.votes.push(VoteRecord {
            reviewer_id: reviewer_id.to_string(),
            vote: vote.as_str().to_string(),
            feedback: feedback.to_string(),
            issues: issues
                .iter()
                .map(|i| serde_json::to_value(i).unwrap_or_default())
                .collect(),
            weight,
        });
        self.store.update_panel(record).await?;
        Ok(())
    }

    /// Aggregate a panel's stored votes and persist the outcome.
    pub async fn aggregate_panel(
        &self,
        panel_id: &str,
        config: &PanelConfig,
    ) -> anyhow::Result<(PanelOutcome, PanelSummary)> {
        let mut record = self.store.get_panel(panel_id).await?;
        let entries: Vec<VoteEntry> = record
            .votes
            .iter()
            .map(|v| VoteEntry {
                reviewer_id: v.reviewer_id.clone(),
                vote: Vote::parse(&v.vote).unwrap_or(Vote::Abstain),
                feedback: v.feedback.clone(),
                issues: v
                    .issues
                    .iter()
                    .filter_map(|i| serde_json::from_value(i.clone()).ok())
                    .collect(),
                weight: v.weight,
            })
            .collect();

        let (outcome, summary) = aggregate(config, &entries);
        record.status = "completed".into();
        record.outcome = Some(outcome.as_str().to_string());
        record.summary = Some(summary.render(outcome));
        self.store.update_panel(record).await?;
        Ok((outcome, summary))
    }

    /// Run a full panel round: fan reviewers out, collect and parse their
    /// responses, then aggregate.
    ///
    /// A reviewer that errors, times out, or never casts a `VOTE:` records
    /// an abstain with the failure text as feedback – one wedged reviewer
    /// must not wedge the workflow.
    pub async fn run_panel(
        &self,
        execution_id: &str,
        node_execution_id: &str,
        config: &PanelConfig,
        question: &str,
        runner: Arc<dyn ReviewerRunner>,
    ) -> anyhow::Result<(ReviewPanelRecord, PanelOutcome, PanelSummary)> {
        let record = self.start_panel(execution_id, node_execution_id, config).await?;
        let deadline = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        let responses: Vec<(ReviewerSpec, anyhow::Result<String>)> = if config.parallel {
            let tasks = config.reviewers.iter().cloned().map(|reviewer| {
                let runner = Arc::clone(&runner);
                let prompt = reviewer.prompt.clone().unwrap_or_else(|| question.to_string());
                async move {
                    let result = match tokio::time::timeout(
                        deadline,
                        runner.run_reviewer(&reviewer, &prompt),
                    )
                    .await
                    {
                        Ok(r) => r,
                        Err(_) => Err(anyhow::anyhow!("reviewer timed out after {deadline:?}")),
                    };
                    (reviewer, result)
                }
            });
            join_all(tasks).await
        } else {
            let mut out = Vec::with_capacity(config.reviewers.len());
            for reviewer in config.reviewers.iter().cloned() {
                let prompt = reviewer.prompt.clone().unwrap_or_else(|| question.to_string());
                let result = match tokio::time::timeout(
                    deadline,
                    runner.run_reviewer(&reviewer, &prompt),
                )
                .await
                {
                    Ok(r) => r,
                    Err(_) => Err(anyhow::anyhow!("reviewer timed out after {deadline:?}")),
                };
                out.push((reviewer, result));
            }
            out
        };

        for (reviewer, result) in responses {
            let (vote, feedback, issues) = match result {
                Ok(text) => {
                    let parsed = parse_review_response(&text);
                    match parsed.vote {
                        Some(v) => (v, parsed.feedback, parsed.issues),
                        None => {
                            debug!(reviewer = %reviewer.agent_id, "no VOTE: in response; recording abstain");
                            (Vote::Abstain, parsed.feedback, parsed.issues)
                        }
                    }
                }
                Err(e) => {
                    warn!(reviewer = %reviewer.agent_id, error = %e, "reviewer failed; recording abstain");
                    (Vote::Abstain, e.to_string(), Vec::new())
                }
            };
            self.add_vote(&record.id, &reviewer.agent_id, vote, &feedback, issues, reviewer.weight)
                .await?;
        }

        let (outcome, summary) = self.aggregate_panel(&record.id, config).await?;
        let record = self.store.get_panel(&record.id).await?;
        Ok((record, outcome, summary))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
