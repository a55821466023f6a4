// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Weighted vote aggregation.

use serde::{Deserialize, Serialize};

use crate::config::{PanelConfig, PanelOutcome, Vote, VotingStrategy};
use crate::parser::Issue;

/// One collected ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteEntry {
    pub reviewer_id: String,
    pub vote: Vote,
    pub feedback: String,
    pub issues: Vec<Issue>,
    pub weight: u32,
}

/// Aggregated tallies plus the collected issues, split by severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelSummary {
    pub total_weight: u32,
    pub approve_weight: u32,
    pub changes_weight: u32,
    pub critical_weight: u32,
    pub abstain_count: u32,
    pub critical_issues: Vec<Issue>,
    pub other_issues: Vec<Issue>,
    pub reason: String,
}

impl PanelSummary {
    /// Human-readable one-paragraph rendering for the transcript.
    pub fn render(&self, outcome: PanelOutcome) -> String {
        format!(
            "Panel outcome: {} – approve {}/{}, changes {}/{}, critical {}/{}, {} abstained. {}",
            outcome.as_str(),
            self.approve_weight,
            self.total_weight,
            self.changes_weight,
            self.total_weight,
            self.critical_weight,
            self.total_weight,
            self.abstain_count,
            self.reason,
        )
    }
}

/// Classify a panel's votes into an outcome.
///
/// Order of gates: quorum → critical-blocks → strategy rule.  The critical
/// gate fires on any non-zero critical weight regardless of how heavy the
/// approve side is.
pub fn aggregate(config: &PanelConfig, votes: &[VoteEntry]) -> (PanelOutcome, PanelSummary) {
    let mut summary = PanelSummary::default();

    for entry in votes {
        match entry.vote {
            Vote::Abstain => summary.abstain_count += 1,
            Vote::Approve => summary.approve_weight += entry.weight,
            Vote::RequestChanges => summary.changes_weight += entry.weight,
            Vote::Critical => summary.critical_weight += entry.weight,
        }
        for issue in &entry.issues {
            if issue.is_critical() {
                summary.critical_issues.push(issue.clone());
            } else {
                summary.other_issues.push(issue.clone());
            }
        }
    }
    summary.total_weight =
        summary.approve_weight + summary.changes_weight + summary.critical_weight;
    let non_abstain = votes.len() as u32 - summary.abstain_count;

    // Quorum gate.  The quorum strategy requires at least two ballots when
    // the config does not name a count.
    let quorum = config.thresholds.quorum.unwrap_or(match config.strategy {
        VotingStrategy::Quorum => 2,
        _ => 0,
    });
    if non_abstain < quorum {
        summary.reason = format!("quorum not met ({non_abstain}/{quorum} ballots)");
        return (PanelOutcome::Escalate, summary);
    }

    // Critical gate.
    if config.thresholds.critical_blocks && summary.critical_weight > 0 {
        summary.reason = "critical vote blocks".into();
        return (PanelOutcome::AddressCritical, summary);
    }

    if summary.total_weight == 0 {
        summary.reason = "no effective votes".into();
        return (PanelOutcome::Escalate, summary);
    }

    let w = summary.total_weight as f32;
    let outcome = match config.strategy {
        VotingStrategy::AnyCritical => {
            // Only criticals block; anything else passes.
            if summary.critical_weight > 0 {
                summary.reason = "critical vote present".into();
                PanelOutcome::AddressCritical
            } else {
                summary.reason = "no critical votes".into();
                PanelOutcome::Approved
            }
        }
        VotingStrategy::WeightedThreshold | VotingStrategy::Quorum => {
            let approve_ratio = summary.approve_weight as f32 / w;
            let changes_ratio = summary.changes_weight as f32 / w;
            if approve_ratio >= config.thresholds.approve_threshold {
                summary.reason = format!(
                    "approve ratio {approve_ratio:.2} ≥ {:.2}",
                    config.thresholds.approve_threshold
                );
                PanelOutcome::Approved
            } else if changes_ratio >= config.thresholds.changes_threshold {
                summary.reason = format!(
                    "changes ratio {changes_ratio:.2} ≥ {:.2}",
                    config.thresholds.changes_threshold
                );
                PanelOutcome::QueueChanges
            } else {
                summary.reason = "no threshold reached".into();
                PanelOutcome::Escalate
            }
        }
        VotingStrategy::Unanimous => {
            if summary.approve_weight == summary.total_weight {
                summary.reason = "unanimous approval".into();
                PanelOutcome::Approved
            } else {
                summary.reason = "approval not unanimous".into();
                PanelOutcome::QueueChanges
            }
        }
        VotingStrategy::Majority => {
            let a = summary.approve_weight;
            let r = summary.changes_weight;
            let c = summary.critical_weight;
            let top = a.max(r).max(c);
            let winners =
                [(a, PanelOutcome::Approved), (r, PanelOutcome::QueueChanges), (c, PanelOutcome::AddressCritical)]
                    .into_iter()
                    .filter(|(weight, _)| *weight == top)
                    .count();
            if winners > 1 {
                summary.reason = "majority tie".into();
                PanelOutcome::Escalate
            } else if a == top {
                summary.reason = "approve majority".into();
                PanelOutcome::Approved
            } else if r == top {
                summary.reason = "request-changes majority".into();
                PanelOutcome::QueueChanges
            } else {
                summary.reason = "critical majority".into();
                PanelOutcome::AddressCritical
            }
        }
    };

    (outcome, summary)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
