//! Round orchestration: seed templates, the artifact rule, consensus
//! extraction, and the driver that ties them together.

pub mod artifact;
pub mod consensus;
pub mod orchestrator;
pub mod prompts;

pub use orchestrator::{summarize_round, DebateError, RoundOrchestrator};
