//! Record types for the two delivery channels.
//!
//! Both channels carry the same underlying callback sequence; the shapes
//! differ per transport. Stream records are what the pull-based consumer
//! reads; socket records add a delivery timestamp and connection lifecycle
//! variants for the push channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::types::ConsensusResult;

/// Records delivered on the pull-based event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    /// First record of every stream.
    SessionStarted { session_id: String },

    /// A participant is about to speak in a round.
    AgentStart { agent: String, round: u32 },

    /// One transcript message with display metadata.
    AgentMessage {
        agent: String,
        emoji: String,
        color: String,
        role: String,
        content: String,
        round: u32,
    },

    /// Terminal success record.
    Complete {
        session_id: String,
        consensus: Option<ConsensusResult>,
        svg_artifacts: Vec<String>,
        final_score: f64,
    },

    /// Terminal failure record.
    Error { message: String },

    /// Emitted when the idle window elapses with no other record.
    Keepalive,
}

impl StreamRecord {
    /// The record type as its wire tag.
    pub fn record_type(&self) -> &'static str {
        match self {
            StreamRecord::SessionStarted { .. } => "session_started",
            StreamRecord::AgentStart { .. } => "agent_start",
            StreamRecord::AgentMessage { .. } => "agent_message",
            StreamRecord::Complete { .. } => "complete",
            StreamRecord::Error { .. } => "error",
            StreamRecord::Keepalive => "keepalive",
        }
    }

    /// Whether this record ends the stream's event sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamRecord::Complete { .. } | StreamRecord::Error { .. })
    }

    /// The round this record belongs to, for round-ordering checks.
    pub fn round(&self) -> Option<u32> {
        match self {
            StreamRecord::AgentStart { round, .. } => Some(*round),
            StreamRecord::AgentMessage { round, .. } => Some(*round),
            _ => None,
        }
    }
}

/// Records delivered on the push-based socket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketRecord {
    /// First record enqueued on every new connection.
    Connected { session_id: String, message: String },

    /// One transcript message, stamped at delivery time.
    AgentMessage {
        agent: String,
        emoji: String,
        color: String,
        role: String,
        content: String,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// Terminal success record.
    DebateComplete {
        session_id: String,
        consensus: Option<ConsensusResult>,
        final_score: f64,
    },

    /// Terminal failure record.
    DebateError { error: String },

    /// Emitted after the inbound idle window elapses.
    Keepalive,

    /// Reply to a client "ping" frame.
    Pong,

    /// Channel close notice; the registry drops the connection after it.
    Closed { code: u16, reason: String },
}

impl SocketRecord {
    /// The record type as its wire tag.
    pub fn record_type(&self) -> &'static str {
        match self {
            SocketRecord::Connected { .. } => "connected",
            SocketRecord::AgentMessage { .. } => "agent_message",
            SocketRecord::DebateComplete { .. } => "debate_complete",
            SocketRecord::DebateError { .. } => "debate_error",
            SocketRecord::Keepalive => "keepalive",
            SocketRecord::Pong => "pong",
            SocketRecord::Closed { .. } => "closed",
        }
    }

    /// Whether this record reflects a terminal session status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SocketRecord::DebateComplete { .. } | SocketRecord::DebateError { .. }
        )
    }
}
