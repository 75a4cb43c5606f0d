//! Scripted multi-round design-debate engine.
//!
//! Coordinates a fixed roster of AI participant roles through three themed
//! rounds over a single design prompt, relays the unfolding transcript to
//! consumers in real time, and derives a converged recommendation when the
//! final round completes.
//!
//! The crate is the orchestration and delivery core:
//! - [`session`]: session/round data model and the in-memory registry
//! - [`rate_gate`]: the global cross-session throttle plus retry wrapper
//! - [`engine`]: the conversation-engine boundary (trait, transcript, errors)
//! - [`debate`]: round orchestration, seed templates, the mandatory-artifact
//!   rule, and consensus extraction
//! - [`events`]: dual-channel fan-out — a pull-based record stream and a
//!   push-based connection registry fed by the same callback sequence
//! - [`service`]: the operations an embedding server exposes
//! - [`config`] / [`net`]: environment-backed settings and listener binding
//!
//! The engine that actually runs a multi-party exchange is an external
//! collaborator injected behind [`engine::ConversationEngine`]; sessions live
//! in memory for the process lifetime unless a store eviction policy says
//! otherwise.

pub mod config;
pub mod debate;
pub mod engine;
pub mod events;
pub mod net;
pub mod rate_gate;
pub mod roster;
pub mod service;
pub mod session;

// Re-export key configuration types
pub use config::{ConfigError, DebateSettings, Provider};

// Re-export the conversation-engine boundary
pub use engine::{
    ConversationEngine, EngineError, ExchangeRequest, GatedEngine, SpeakerSelection, Transcript,
    TranscriptEntry,
};

// Re-export the rate gate
pub use rate_gate::RateGate;

// Re-export key session types
pub use session::{
    AgentMessage, ConsensusResult, DebateRound, DebateSession, EvictionPolicy, MessageKind,
    RoundStatus, SessionHandle, SessionStatus, SessionStore, TransitionError,
};

// Re-export the debate driver
pub use debate::{DebateError, RoundOrchestrator};

// Re-export delivery types
pub use events::{
    BroadcastSink, ConnectionRegistry, DebateStream, EventSink, SocketRecord, StreamRecord,
    StreamSink,
};

// Re-export the service surface
pub use roster::{AgentProfile, Roster};
pub use service::{
    DebateRequest, DebateService, RosterInfo, ServiceError, SessionRounds, SessionStatusView,
    StartedDebate,
};
