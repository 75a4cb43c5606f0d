//! Consensus extraction from the final round.
//!
//! The heuristic reads only the last message of the last round. The vote
//! mapping is synthesized as "approve" for every non-moderator role no matter
//! what the transcript says; downstream consumers treat it as a placeholder
//! and the behavior is pinned by tests.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::roster::Roster;
use crate::session::types::{ConsensusResult, DebateSession};

/// "score: 8.5/10", "consensus 7", etc. Run against lowered text.
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:score|consensus)[:\s]*(\d+(?:\.\d+)?)\s*(?:/\s*10)?")
        .expect("SCORE_RE regex should compile")
});

/// Default score when the final round had messages but none carried a score.
const DEFAULT_SCORE: f64 = 7.5;
/// Score when the final round produced no messages at all.
const EMPTY_ROUND_SCORE: f64 = 5.0;
/// Characters of the final message kept as the consensus summary.
const SUMMARY_CHARS: usize = 1000;

/// First score mentioned in `text`, clamped to 10.
pub fn extract_score(text: &str) -> Option<f64> {
    SCORE_RE
        .captures(&text.to_lowercase())
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|score| score.min(10.0))
}

/// Derive the consensus result from a finished session.
pub fn calculate_consensus(session: &DebateSession, roster: &Roster) -> ConsensusResult {
    let last_message = session
        .rounds
        .last()
        .and_then(|round| round.messages.last())
        .map(|message| message.content.as_str());

    let Some(last_message) = last_message else {
        return ConsensusResult {
            score: EMPTY_ROUND_SCORE,
            direction: "No consensus reached".to_string(),
            decisions: Vec::new(),
            votes: BTreeMap::new(),
            summary: "Debate concluded".to_string(),
        };
    };

    let votes: BTreeMap<String, String> = roster
        .participants()
        .map(|profile| (profile.name.clone(), "approve".to_string()))
        .collect();

    let summary = if last_message.is_empty() {
        "Debate concluded".to_string()
    } else {
        last_message.chars().take(SUMMARY_CHARS).collect()
    };

    ConsensusResult {
        score: extract_score(last_message).unwrap_or(DEFAULT_SCORE),
        direction: "Consensus reached through collaborative debate".to_string(),
        decisions: Vec::new(),
        votes,
        summary,
    }
}
