//! Pull-based delivery channel.
//!
//! [`channel`] pairs a [`StreamSink`] handed to the orchestrator task with a
//! [`DebateStream`] the consumer drains. The stream yields a keepalive record
//! whenever nothing arrives within the idle window and ends once the
//! producing task is gone and the buffer is drained. A dropped stream never
//! stops the underlying run; sink sends to a gone consumer are discarded.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::types::StreamRecord;
use super::EventSink;
use crate::roster::Roster;
use async_trait::async_trait;

/// Default idle window before a keepalive record is emitted.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(120);

/// Create a linked sink/stream pair.
pub fn channel(roster: Roster, idle_window: Duration) -> (StreamSink, DebateStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StreamSink { roster, tx },
        DebateStream {
            rx,
            idle_window,
        },
    )
}

/// Producer side: enriches callback messages with roster metadata and feeds
/// the stream.
pub struct StreamSink {
    roster: Roster,
    tx: mpsc::UnboundedSender<StreamRecord>,
}

impl StreamSink {
    /// Send a record. A gone consumer is routine; the record is dropped.
    pub fn send(&self, record: StreamRecord) {
        let _ = self.tx.send(record);
    }
}

#[async_trait]
impl EventSink for StreamSink {
    async fn message(&self, agent: &str, content: &str, round: u32) {
        let profile = self.roster.profile(agent);
        self.send(StreamRecord::AgentStart {
            agent: agent.to_string(),
            round,
        });
        self.send(StreamRecord::AgentMessage {
            agent: agent.to_string(),
            emoji: profile.emoji,
            color: profile.color,
            role: profile.role,
            content: content.to_string(),
            round,
        });
    }
}

/// Consumer side of the stream channel.
pub struct DebateStream {
    rx: mpsc::UnboundedReceiver<StreamRecord>,
    idle_window: Duration,
}

impl DebateStream {
    /// Next record: a buffered one, a keepalive on idle timeout, or `None`
    /// once the producer is gone and the buffer is drained.
    pub async fn next_record(&mut self) -> Option<StreamRecord> {
        match timeout(self.idle_window, self.rx.recv()).await {
            Ok(record) => record,
            Err(_) => Some(StreamRecord::Keepalive),
        }
    }

    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }
}
