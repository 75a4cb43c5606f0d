//! Dual-channel event fan-out.
//!
//! The orchestrator emits one ordered callback sequence through [`EventSink`];
//! the [`stream`] module adapts it to a pull-based record stream and the
//! [`broadcast`] module to a push-based per-session connection registry. Both
//! channels see the same events in the same order.

pub mod broadcast;
pub mod stream;
pub mod types;

use async_trait::async_trait;

/// Delivery callback fired by the orchestrator for every transcript message.
///
/// `round` is the 1-based round number, or 0 for session-level failure
/// notices. Sinks must not fail: delivery problems are the sink's own
/// cleanup concern and never surface into the run.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn message(&self, agent: &str, content: &str, round: u32);
}

pub use broadcast::{
    serve_client, BroadcastSink, ConnectionRegistry, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL,
    DEFAULT_CLIENT_IDLE_WINDOW,
};
pub use stream::{DebateStream, StreamSink, DEFAULT_IDLE_WINDOW};
pub use types::{SocketRecord, StreamRecord};
