// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tolerant parser for reviewer responses.
//!
//! Reviewers are asked to end with `VOTE: <value>` and `FEEDBACK: <body>`,
//! optionally followed by `ISSUES: <json array>`.  Models pad, re-order and
//! capitalise freely, so matching is case-insensitive and anchored to line
//! starts rather than a strict grammar.  A missing `VOTE:` leaves the vote
//! `None`; the caller records an abstain.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Vote;

/// One structured issue reported by a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default = "Issue::default_severity")]
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub file: Option<String>,
}

impl Issue {
    fn default_severity() -> String {
        "minor".into()
    }

    pub fn is_critical(&self) -> bool {
        self.severity.eq_ignore_ascii_case("critical")
    }
}

/// Parse result; `vote = None` means the reviewer never cast one.
#[derive(Debug, Clone, Default)]
pub struct ParsedReview {
    pub vote: Option<Vote>,
    pub feedback: String,
    pub issues: Vec<Issue>,
}

/// Extract vote, feedback and issues from a free-text reviewer response.
pub fn parse_review_response(text: &str) -> ParsedReview {
    let vote_re = Regex::new(r"(?im)^\s*VOTE:\s*([a-z_]+)").expect("static regex");
    let vote = vote_re
        .captures(text)
        .and_then(|c| Vote::parse(&c[1]));

    let feedback_re =
        Regex::new(r"(?is)FEEDBACK:\s*(.*?)(?:\n\s*ISSUES:|\n\s*VOTE:|\z)").expect("static regex");
    let feedback = feedback_re
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    let issues_re = Regex::new(r"(?is)ISSUES:\s*(\[.*\])").expect("static regex");
    let issues = issues_re
        .captures(text)
        .and_then(|c| match serde_json::from_str::<Vec<Issue>>(&c[1]) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "unparseable ISSUES block ignored");
                None
            }
        })
        .unwrap_or_default();

    ParsedReview { vote, feedback, issues }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vote_and_feedback() {
        let r = parse_review_response(
            "The change looks solid overall.\n\nVOTE: approve\nFEEDBACK: Clean implementation.",
        );
        assert_eq!(r.vote, Some(Vote::Approve));
        assert_eq!(r.feedback, "Clean implementation.");
    }

    #[test]
    fn vote_matching_is_case_insensitive() {
        let r = parse_review_response("vote: CRITICAL\nfeedback: SQL injection in query builder.");
        assert_eq!(r.vote, Some(Vote::Critical));
        assert!(r.feedback.contains("SQL injection"));
    }

    #[test]
    fn missing_vote_yields_none() {
        let r = parse_review_response("I think this is mostly fine but I'm not sure.");
        assert!(r.vote.is_none());
        assert!(r.issues.is_empty());
    }

    #[test]
    fn multiline_feedback_is_captured_up_to_issues() {
        let r = parse_review_response(
            "VOTE: request_changes\nFEEDBACK: First problem.\nSecond problem.\nISSUES: []",
        );
        assert_eq!(r.vote, Some(Vote::RequestChanges));
        assert_eq!(r.feedback, "First problem.\nSecond problem.");
    }

    #[test]
    fn issues_json_is_parsed_into_structs() {
        let r = parse_review_response(
            r#"VOTE: critical
FEEDBACK: Security hole.
ISSUES: [{"severity": "critical", "description": "token logged", "file": "src/auth.rs"},
         {"description": "typo in comment"}]"#,
        );
        assert_eq!(r.issues.len(), 2);
        assert!(r.issues[0].is_critical());
        assert_eq!(r.issues[0].file.as_deref(), Some("src/auth.rs"));
        assert_eq!(r.issues[1].severity, "minor");
    }

    #[test]
    fn malformed_issues_json_is_ignored() {
        let r = parse_review_response("VOTE: approve\nFEEDBACK: ok\nISSUES: [not json");
        assert_eq!(r.vote, Some(Vote::Approve));
        assert!(r.issues.is_empty());
    }

    #[test]
    fn vote_embedded_mid_text_is_found() {
        let r = parse_review_response(
            "Summary of my review follows.\nVOTE: approve\nThat is all.",
        );
        assert_eq!(r.vote, Some(Vote::Approve));
    }

    #[test]
    fn unknown_vote_value_yields_none() {
        let r = parse_review_response("VOTE: lgtm\nFEEDBACK: ship it");
        assert!(r.vote.is_none());
        assert_eq!(r.feedback, "ship it");
    }
}
