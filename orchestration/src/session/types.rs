//! Session and round data model for the scripted design debate.
//!
//! A session owns exactly three rounds, created eagerly when the session is
//! created. Status fields are closed enums that only move forward; the
//! orchestrator task that owns a session is its only writer, everything else
//! reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

/// Fixed themes for the three debate rounds, in execution order.
pub const ROUND_THEMES: [&str; 3] = [
    "Initial Analysis & Proposals",
    "Critique & Refinement Debate",
    "Final Consensus",
];

/// Lifecycle status of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not yet picked up by an orchestrator task.
    Pending,
    /// Rounds are running.
    InProgress,
    /// All rounds finished and consensus stored.
    Completed,
    /// An unrecovered error ended the run.
    Failed,
}

impl SessionStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(self) -> &'static [SessionStatus] {
        match self {
            Self::Pending => &[Self::InProgress],
            Self::InProgress => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Progress status of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Not yet started.
    Pending,
    /// Exchange running or transcript being replayed.
    InProgress,
    /// Summary written, no further mutation.
    Complete,
}

impl RoundStatus {
    /// Valid transitions from this status.
    pub fn valid_transitions(self) -> &'static [RoundStatus] {
        match self {
            Self::Pending => &[Self::InProgress],
            Self::InProgress => &[Self::Complete],
            Self::Complete => &[],
        }
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Error for status moves that would go backward or skip a step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("invalid session transition {from} → {to}")]
    Session {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("invalid round transition {from} → {to}")]
    Round { from: RoundStatus, to: RoundStatus },
}

/// Kind of message appended to a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Discussion,
    Vote,
    Consensus,
}

/// One utterance by a participant within a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Participant name (e.g. "DesignArtist").
    pub agent_name: String,
    /// Display role (e.g. "Design Artist").
    pub agent_role: String,
    /// Message body.
    pub content: String,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
    /// 1-based round the message belongs to.
    pub round_number: u32,
    /// Message kind. Transcript replay only ever appends `Discussion`.
    pub kind: MessageKind,
}

impl AgentMessage {
    /// Build a discussion message stamped now.
    pub fn discussion(agent_name: &str, agent_role: &str, content: &str, round_number: u32) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            agent_role: agent_role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            round_number,
            kind: MessageKind::Discussion,
        }
    }
}

/// One themed round within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRound {
    /// 1-based position in the session.
    pub round_number: u32,
    /// Fixed theme from [`ROUND_THEMES`].
    pub theme: String,
    /// Messages in arrival order. Never reordered or removed once appended.
    pub messages: Vec<AgentMessage>,
    /// Per-participant votes. Kept on the record; nothing downstream reads
    /// them yet.
    pub votes: HashMap<String, String>,
    /// Round progress.
    pub status: RoundStatus,
    /// Free-text summary, empty until the round finishes.
    pub summary: String,
}

impl DebateRound {
    /// Create a pending round.
    pub fn new(round_number: u32, theme: &str) -> Self {
        Self {
            round_number,
            theme: theme.to_string(),
            messages: Vec::new(),
            votes: HashMap::new(),
            status: RoundStatus::Pending,
            summary: String::new(),
        }
    }

    /// Move the round status forward.
    pub fn advance(&mut self, to: RoundStatus) -> Result<(), TransitionError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(TransitionError::Round {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Converged outcome derived from the final round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Numeric score in 0..=10.
    pub score: f64,
    /// Free-text direction statement.
    pub direction: String,
    /// Agreed decisions. Currently always empty; the extractor does not mine
    /// them from the transcript.
    pub decisions: Vec<String>,
    /// Participant votes. Synthesized, not read from the transcript.
    pub votes: BTreeMap<String, String>,
    /// Leading slice of the final message.
    pub summary: String,
}

/// One end-to-end debate over a single design prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    /// Unique opaque identifier.
    pub session_id: String,
    /// The design prompt under debate.
    pub design_prompt: String,
    /// Optional external project reference.
    pub project_id: Option<String>,
    /// Session lifecycle status.
    pub status: SessionStatus,
    /// Exactly three rounds, created up front.
    pub rounds: Vec<DebateRound>,
    /// Consensus result, set when the final round completes.
    pub consensus: Option<ConsensusResult>,
    /// Final score, 0.0 until consensus is stored.
    pub final_score: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time, set on the completed transition.
    pub completed_at: Option<DateTime<Utc>>,
}

impl DebateSession {
    /// Create a pending session with its three themed rounds.
    pub fn new(design_prompt: &str, project_id: Option<String>) -> Self {
        let rounds = ROUND_THEMES
            .iter()
            .enumerate()
            .map(|(i, theme)| DebateRound::new(i as u32 + 1, theme))
            .collect();
        Self {
            session_id: Uuid::new_v4().to_string(),
            design_prompt: design_prompt.to_string(),
            project_id,
            status: SessionStatus::Pending,
            rounds,
            consensus: None,
            final_score: 0.0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move the session status forward.
    pub fn advance(&mut self, to: SessionStatus) -> Result<(), TransitionError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(TransitionError::Session {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// 1-based number of the first round that is not yet complete, or the
    /// round count once every round is.
    pub fn current_round_number(&self) -> u32 {
        self.rounds
            .iter()
            .find(|r| r.status != RoundStatus::Complete)
            .map(|r| r.round_number)
            .unwrap_or(self.rounds.len() as u32)
    }

    /// Total messages across all rounds.
    pub fn message_count(&self) -> usize {
        self.rounds.iter().map(|r| r.messages.len()).sum()
    }

    /// Round by 1-based number.
    pub fn round(&self, number: u32) -> Option<&DebateRound> {
        self.rounds.iter().find(|r| r.round_number == number)
    }

    /// Mutable round by 1-based number.
    pub fn round_mut(&mut self, number: u32) -> Option<&mut DebateRound> {
        self.rounds.iter_mut().find(|r| r.round_number == number)
    }
}
