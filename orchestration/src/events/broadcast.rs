//! Push-based delivery channel.
//!
//! The [`ConnectionRegistry`] maps session id to live client connections and
//! fans every record out to all of them. A connection whose receiver is gone
//! is pruned during the next broadcast; pruning is routine cleanup, never a
//! session error, and a disconnect does not pause or stop the underlying run.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use super::types::SocketRecord;
use super::EventSink;
use crate::roster::Roster;
use async_trait::async_trait;

/// Close code for a normally completed session.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code for a session that ended in failure.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// Default inbound idle window before [`serve_client`] sends a keepalive.
pub const DEFAULT_CLIENT_IDLE_WINDOW: Duration = Duration::from_secs(60);

struct Connection {
    connection_id: String,
    tx: mpsc::UnboundedSender<SocketRecord>,
}

/// Per-session registry of push-channel connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Vec<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a session.
    ///
    /// The connected record is enqueued immediately, before anything the
    /// session broadcasts afterwards.
    pub async fn connect(
        &self,
        session_id: &str,
    ) -> (String, mpsc::UnboundedReceiver<SocketRecord>) {
        let connection_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(SocketRecord::Connected {
            session_id: session_id.to_string(),
            message: "Connected to debate stream".to_string(),
        });
        self.connections
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(Connection {
                connection_id: connection_id.clone(),
                tx,
            });
        debug!(session_id, connection_id = %connection_id, "connection registered");
        (connection_id, rx)
    }

    /// Remove one connection. No-op when it is already gone.
    pub async fn disconnect(&self, session_id: &str, connection_id: &str) {
        let mut connections = self.connections.lock().await;
        if let Some(list) = connections.get_mut(session_id) {
            list.retain(|c| c.connection_id != connection_id);
            if list.is_empty() {
                connections.remove(session_id);
            }
        }
        debug!(session_id, connection_id, "connection removed");
    }

    /// Deliver a record to every live connection of a session, pruning any
    /// whose receiver is gone.
    pub async fn broadcast(&self, session_id: &str, record: SocketRecord) {
        let mut connections = self.connections.lock().await;
        let Some(list) = connections.get_mut(session_id) else {
            return;
        };
        list.retain(|connection| match connection.tx.send(record.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(
                    session_id,
                    connection_id = %connection.connection_id,
                    "pruning dead connection"
                );
                false
            }
        });
        if list.is_empty() {
            connections.remove(session_id);
        }
    }

    /// Deliver a record to a single connection. Returns false when that
    /// connection no longer exists or its receiver is gone.
    pub async fn send_to(
        &self,
        session_id: &str,
        connection_id: &str,
        record: SocketRecord,
    ) -> bool {
        let connections = self.connections.lock().await;
        connections
            .get(session_id)
            .and_then(|list| list.iter().find(|c| c.connection_id == connection_id))
            .map(|connection| connection.tx.send(record).is_ok())
            .unwrap_or(false)
    }

    /// Send a close notice to every connection of a session and drop them
    /// all. Used once the session reaches a terminal status.
    pub async fn close_session(&self, session_id: &str, code: u16, reason: &str) {
        let removed = self.connections.lock().await.remove(session_id);
        let Some(list) = removed else {
            return;
        };
        debug!(session_id, code, reason, connections = list.len(), "closing session channel");
        for connection in list {
            let _ = connection.tx.send(SocketRecord::Closed {
                code,
                reason: reason.to_string(),
            });
        }
    }

    /// Live connections registered for a session.
    pub async fn connection_count(&self, session_id: &str) -> usize {
        self.connections
            .lock()
            .await
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Serve one client's inbound side: answer "ping" frames with a pong and
/// send a keepalive after each idle window. Returns when the client's inbound
/// channel closes or its outbound connection is gone.
pub async fn serve_client(
    registry: &ConnectionRegistry,
    session_id: &str,
    connection_id: &str,
    mut inbound: mpsc::UnboundedReceiver<String>,
    idle_window: Duration,
) {
    loop {
        let delivered = match timeout(idle_window, inbound.recv()).await {
            Ok(Some(frame)) if frame == "ping" => {
                registry
                    .send_to(session_id, connection_id, SocketRecord::Pong)
                    .await
            }
            Ok(Some(_)) => true, // other client frames are ignored
            Ok(None) => {
                registry.disconnect(session_id, connection_id).await;
                return;
            }
            Err(_) => {
                registry
                    .send_to(session_id, connection_id, SocketRecord::Keepalive)
                    .await
            }
        };
        if !delivered {
            return;
        }
    }
}

/// Sink adapter feeding the orchestrator callback into the registry.
pub struct BroadcastSink {
    registry: Arc<ConnectionRegistry>,
    roster: Roster,
    session_id: String,
}

impl BroadcastSink {
    pub fn new(registry: Arc<ConnectionRegistry>, roster: Roster, session_id: String) -> Self {
        Self {
            registry,
            roster,
            session_id,
        }
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn message(&self, agent: &str, content: &str, round: u32) {
        let profile = self.roster.profile(agent);
        self.registry
            .broadcast(
                &self.session_id,
                SocketRecord::AgentMessage {
                    agent: agent.to_string(),
                    emoji: profile.emoji,
                    color: profile.color,
                    role: profile.role,
                    content: content.to_string(),
                    round,
                    timestamp: Utc::now(),
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_enqueues_connected_first() {
        let registry = ConnectionRegistry::new();
        let (_, mut rx) = registry.connect("s1").await;
        registry.broadcast("s1", SocketRecord::Keepalive).await;

        match rx.recv().await.unwrap() {
            SocketRecord::Connected { session_id, message } => {
                assert_eq!(session_id, "s1");
                assert_eq!(message, "Connected to debate stream");
            }
            other => panic!("expected connected, got {other:?}"),
        }
        assert_eq!(rx.recv().await.unwrap().record_type(), "keepalive");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_connections() {
        let registry = ConnectionRegistry::new();
        let (_, mut rx_a) = registry.connect("s1").await;
        let (_, mut rx_b) = registry.connect("s1").await;
        assert_eq!(registry.connection_count("s1").await, 2);

        registry.broadcast("s1", SocketRecord::Keepalive).await;
        rx_a.recv().await.unwrap(); // connected
        rx_b.recv().await.unwrap(); // connected
        assert_eq!(rx_a.recv().await.unwrap().record_type(), "keepalive");
        assert_eq!(rx_b.recv().await.unwrap().record_type(), "keepalive");
    }

    #[tokio::test]
    async fn test_dead_connection_pruned_survivor_keeps_receiving() {
        let registry = ConnectionRegistry::new();
        let (_, rx_dead) = registry.connect("s1").await;
        let (_, mut rx_live) = registry.connect("s1").await;
        drop(rx_dead);

        registry.broadcast("s1", SocketRecord::Keepalive).await;
        assert_eq!(registry.connection_count("s1").await, 1);

        registry.broadcast("s1", SocketRecord::Pong).await;
        rx_live.recv().await.unwrap(); // connected
        assert_eq!(rx_live.recv().await.unwrap().record_type(), "keepalive");
        assert_eq!(rx_live.recv().await.unwrap().record_type(), "pong");
    }

    #[tokio::test]
    async fn test_close_session_notifies_and_clears() {
        let registry = ConnectionRegistry::new();
        let (_, mut rx) = registry.connect("s1").await;
        registry.close_session("s1", CLOSE_NORMAL, "debate complete").await;

        rx.recv().await.unwrap(); // connected
        match rx.recv().await.unwrap() {
            SocketRecord::Closed { code, reason } => {
                assert_eq!(code, CLOSE_NORMAL);
                assert_eq!(reason, "debate complete");
            }
            other => panic!("expected closed, got {other:?}"),
        }
        assert_eq!(registry.connection_count("s1").await, 0);
        // Channel ends after the registry dropped its sender.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_session_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.broadcast("nope", SocketRecord::Keepalive).await;
        registry.close_session("nope", CLOSE_NORMAL, "done").await;
    }

    #[tokio::test]
    async fn test_serve_client_answers_ping() {
        let registry = ConnectionRegistry::new();
        let (connection_id, mut rx) = registry.connect("s1").await;
        let (tx_in, rx_in) = mpsc::unbounded_channel();

        tx_in.send("ping".to_string()).unwrap();
        drop(tx_in);
        serve_client(&registry, "s1", &connection_id, rx_in, DEFAULT_CLIENT_IDLE_WINDOW).await;

        rx.recv().await.unwrap(); // connected
        assert_eq!(rx.recv().await.unwrap().record_type(), "pong");
        // Inbound closed, connection removed.
        assert_eq!(registry.connection_count("s1").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serve_client_sends_keepalive_on_idle() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (connection_id, mut rx) = registry.connect("s1").await;
        let (tx_in, rx_in) = mpsc::unbounded_channel::<String>();

        let serving = {
            let registry = registry.clone();
            tokio::spawn(async move {
                serve_client(&registry, "s1", &connection_id, rx_in, Duration::from_secs(60)).await;
            })
        };

        rx.recv().await.unwrap(); // connected
        assert_eq!(rx.recv().await.unwrap().record_type(), "keepalive");
        assert_eq!(rx.recv().await.unwrap().record_type(), "keepalive");

        drop(tx_in);
        serving.await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_sink_attaches_metadata_and_timestamp() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_, mut rx) = registry.connect("s1").await;
        let sink = BroadcastSink::new(registry, Roster::standard(), "s1".to_string());

        sink.message("BrandStrategist", "Lean into the heritage angle.", 2)
            .await;

        rx.recv().await.unwrap(); // connected
        match rx.recv().await.unwrap() {
            SocketRecord::AgentMessage {
                agent,
                emoji,
                role,
                round,
                ..
            } => {
                assert_eq!(agent, "BrandStrategist");
                assert_eq!(emoji, "💡");
                assert_eq!(role, "Brand Strategist");
                assert_eq!(round, 2);
            }
            other => panic!("expected agent_message, got {other:?}"),
        }
    }
}
