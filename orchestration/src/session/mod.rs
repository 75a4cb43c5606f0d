//! Session data model and in-memory registry.

pub mod store;
pub mod types;

pub use store::{EvictionPolicy, SessionHandle, SessionStore};
pub use types::{
    AgentMessage, ConsensusResult, DebateRound, DebateSession, MessageKind, RoundStatus,
    SessionStatus, TransitionError, ROUND_THEMES,
};
