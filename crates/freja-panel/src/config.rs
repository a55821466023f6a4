// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

/// A reviewer's ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Critical,
    RequestChanges,
    Approve,
    Abstain,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::RequestChanges => "request_changes",
            Self::Approve => "approve",
            Self::Abstain => "abstain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "request_changes" | "requestchanges" | "changes" => Some(Self::RequestChanges),
            "approve" | "approved" => Some(Self::Approve),
            "abstain" => Some(Self::Abstain),
            _ => None,
        }
    }
}

/// One reviewer seat on a panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerSpec {
    pub agent_id: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Required reviewers count toward quorum even when they abstain.
    #[serde(default)]
    pub required: bool,
    /// Per-reviewer prompt override; the panel question is used otherwise.
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ReviewerSpec {
    pub fn new(agent_id: impl Into<String>, weight: u32) -> Self {
        Self { agent_id: agent_id.into(), weight, required: false, prompt: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    #[default]
    WeightedThreshold,
    Unanimous,
    Majority,
    AnyCritical,
    Quorum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingThresholds {
    /// A single critical vote forces `address_critical`, regardless of
    /// weights.
    #[serde(default = "default_true")]
    pub critical_blocks: bool,
    #[serde(default = "VotingThresholds::default_approve")]
    pub approve_threshold: f32,
    #[serde(default = "VotingThresholds::default_changes")]
    pub changes_threshold: f32,
    /// Minimum non-abstain ballots; below it the panel escalates.
    #[serde(default)]
    pub quorum: Option<u32>,
}

impl VotingThresholds {
    fn default_approve() -> f32 {
        0.7
    }
    fn default_changes() -> f32 {
        0.4
    }
}

impl Default for VotingThresholds {
    fn default() -> Self {
        Self {
            critical_blocks: true,
            approve_threshold: Self::default_approve(),
            changes_threshold: Self::default_changes(),
            quorum: None,
        }
    }
}

/// Classified result of a panel round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelOutcome {
    AddressCritical,
    QueueChanges,
    Approved,
    Escalate,
}

impl PanelOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddressCritical => "address_critical",
            Self::QueueChanges => "queue_changes",
            Self::Approved => "approved",
            Self::Escalate => "escalate",
        }
    }
}

/// What the workflow does with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeAction {
    /// Route to `target` and start a new iteration.
    Loop,
    /// Route to `target` (or dependency-resolved next) in this iteration.
    Continue,
    Pause,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRoute {
    pub action: OutcomeAction,
    #[serde(default)]
    pub target: Option<String>,
}

/// Per-node panel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub reviewers: Vec<ReviewerSpec>,
    #[serde(default)]
    pub strategy: VotingStrategy,
    #[serde(default)]
    pub thresholds: VotingThresholds,
    /// Outcome → routing; outcomes without a route use the scheduler's
    /// defaults.
    #[serde(default)]
    pub outcomes: HashMap<PanelOutcome, OutcomeRoute>,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            reviewers: Vec::new(),
            strategy: VotingStrategy::default(),
            thresholds: VotingThresholds::default(),
            outcomes: HashMap::new(),
            parallel: true,
            timeout_secs: None,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_parse_accepts_aliases() {
        assert_eq!(Vote::parse("APPROVE"), Some(Vote::Approve));
        assert_eq!(Vote::parse("approved"), Some(Vote::Approve));
        assert_eq!(Vote::parse("request_changes"), Some(Vote::RequestChanges));
        assert_eq!(Vote::parse("changes"), Some(Vote::RequestChanges));
        assert_eq!(Vote::parse(" critical "), Some(Vote::Critical));
        assert_eq!(Vote::parse("maybe"), None);
    }

    #[test]
    fn vote_round_trips_through_str() {
        for v in [Vote::Critical, Vote::RequestChanges, Vote::Approve, Vote::Abstain] {
            assert_eq!(Vote::parse(v.as_str()), Some(v));
        }
    }

    #[test]
    fn thresholds_default_to_spec_values() {
        let t = VotingThresholds::default();
        assert!(t.critical_blocks);
        assert_eq!(t.approve_threshold, 0.7);
        assert_eq!(t.changes_threshold, 0.4);
        assert!(t.quorum.is_none());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: PanelConfig = serde_json::from_str(
            r#"{"reviewers": [{"agent_id": "sec", "weight": 2}]}"#,
        )
        .unwrap();
        assert!(cfg.parallel);
        assert_eq!(cfg.strategy, VotingStrategy::WeightedThreshold);
        assert_eq!(cfg.reviewers[0].weight, 2);
    }

    #[test]
    fn reviewer_weight_defaults_to_one() {
        let r: ReviewerSpec = serde_json::from_str(r#"{"agent_id": "style"}"#).unwrap();
        assert_eq!(r.weight, 1);
    }

    #[test]
    fn outcome_map_uses_snake_case_keys() {
        let cfg: PanelConfig = serde_json::from_str(
            r#"{
                "reviewers": [],
                "outcomes": {"address_critical": {"action": "loop", "target": "coder"}}
            }"#,
        )
        .unwrap();
        let route = cfg.outcomes.get(&PanelOutcome::AddressCritical).unwrap();
        assert_eq!(route.action, OutcomeAction::Loop);
        assert_eq!(route.target.as_deref(), Some("coder"));
    }
}
