//! Operation surface an embedding server exposes.
//!
//! [`DebateService`] owns the session store, the connection registry, and the
//! gated engine, and spawns one background task per debate so starting a run
//! returns immediately. Queries are read-only snapshots; unknown session ids
//! map to [`ServiceError::SessionNotFound`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DebateSettings;
use crate::debate::{artifact, RoundOrchestrator};
use crate::engine::{ConversationEngine, GatedEngine};
use crate::events::{
    broadcast::BroadcastSink, stream, ConnectionRegistry, DebateStream, SocketRecord,
    StreamRecord, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL,
};
use crate::rate_gate::RateGate;
use crate::roster::{AgentProfile, Roster};
use crate::session::store::{SessionHandle, SessionStore};
use crate::session::types::{DebateRound, DebateSession, SessionStatus};

/// Request to start a debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRequest {
    pub prompt: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Immediate response of the broadcast start variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedDebate {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

/// Status snapshot for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusView {
    pub session_id: String,
    pub status: SessionStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub messages_count: usize,
    pub design_prompt: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Per-round transcripts for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRounds {
    pub session_id: String,
    pub rounds: Vec<DebateRound>,
}

/// Static roster plus the current debate limits.
#[derive(Debug, Clone, Serialize)]
pub struct RosterInfo {
    pub agents: Vec<AgentProfile>,
    pub debate_settings: DebateLimits,
}

/// The configuration values consumers care about.
#[derive(Debug, Clone, Serialize)]
pub struct DebateLimits {
    pub max_rounds: u32,
    pub max_messages_per_round: u32,
    pub max_message_chars: usize,
}

/// Errors surfaced to service callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("session {0} not found")]
    SessionNotFound(String),
}

/// Debate orchestration service over one conversation engine.
pub struct DebateService<E> {
    settings: DebateSettings,
    roster: Roster,
    store: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    engine: Arc<GatedEngine<E>>,
    stream_idle_window: Duration,
}

impl<E: ConversationEngine + 'static> DebateService<E> {
    /// Build a service over `engine`, throttled by `gate`. The gate is shared
    /// by every call the service makes; pass the process-wide gate to hold
    /// one throughput ceiling across services.
    pub fn new(settings: DebateSettings, engine: E, gate: Arc<RateGate>) -> Self {
        Self {
            settings,
            roster: Roster::standard(),
            store: Arc::new(SessionStore::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            engine: Arc::new(GatedEngine::new(engine, gate)),
            stream_idle_window: stream::DEFAULT_IDLE_WINDOW,
        }
    }

    /// Replace the default session store (e.g. one with an eviction policy).
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Override the stream idle window. Tests shrink it.
    pub fn with_stream_idle_window(mut self, window: Duration) -> Self {
        self.stream_idle_window = window;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &DebateSettings {
        &self.settings
    }

    fn orchestrator(&self) -> RoundOrchestrator<Arc<GatedEngine<E>>> {
        RoundOrchestrator::new(self.engine.clone(), self.roster.clone(), self.settings.clone())
    }

    /// Start a debate delivered on a pull-based stream.
    ///
    /// The run executes in a background task; the returned stream yields
    /// `session_started` first, the per-message records in order, and exactly
    /// one terminal `complete` or `error` record.
    pub async fn start_streaming(&self, request: DebateRequest) -> DebateStream {
        let handle = self.store.create(&request.prompt, request.project_id).await;
        let session_id = handle.read().await.session_id.clone();
        info!(session_id = %session_id, "starting streamed debate");

        let (sink, debate_stream) = stream::channel(self.roster.clone(), self.stream_idle_window);
        sink.send(StreamRecord::SessionStarted {
            session_id: session_id.clone(),
        });

        let orchestrator = self.orchestrator();
        tokio::spawn(async move {
            match orchestrator.run(&handle, &sink).await {
                Ok(()) => {
                    let session = handle.read().await;
                    let svg_artifacts = session
                        .round(1)
                        .map(|round| {
                            artifact::extract_svg_blocks(
                                round.messages.iter().map(|m| m.content.as_str()),
                            )
                        })
                        .unwrap_or_default();
                    sink.send(StreamRecord::Complete {
                        session_id,
                        consensus: session.consensus.clone(),
                        svg_artifacts,
                        final_score: session.final_score,
                    });
                }
                Err(err) => {
                    sink.send(StreamRecord::Error {
                        message: err.to_string(),
                    });
                }
            }
        });
        debate_stream
    }

    /// Start a debate delivered on the push channel.
    ///
    /// Returns immediately; clients subscribe on the registry under the
    /// returned session id. Once the session reaches a terminal status the
    /// terminal record is broadcast and every subscribed connection is closed
    /// with the matching code.
    pub async fn start_broadcast(&self, request: DebateRequest) -> StartedDebate {
        let handle = self.store.create(&request.prompt, request.project_id).await;
        let (session_id, round_count) = {
            let session = handle.read().await;
            (session.session_id.clone(), session.rounds.len())
        };
        info!(session_id = %session_id, "starting broadcast debate");

        let sink = BroadcastSink::new(
            self.registry.clone(),
            self.roster.clone(),
            session_id.clone(),
        );
        let orchestrator = self.orchestrator();
        let registry = self.registry.clone();
        let task_session_id = session_id.clone();
        tokio::spawn(async move {
            match orchestrator.run(&handle, &sink).await {
                Ok(()) => {
                    let (consensus, final_score) = {
                        let session = handle.read().await;
                        (session.consensus.clone(), session.final_score)
                    };
                    registry
                        .broadcast(
                            &task_session_id,
                            SocketRecord::DebateComplete {
                                session_id: task_session_id.clone(),
                                consensus,
                                final_score,
                            },
                        )
                        .await;
                    registry
                        .close_session(&task_session_id, CLOSE_NORMAL, "debate complete")
                        .await;
                }
                Err(err) => {
                    registry
                        .broadcast(
                            &task_session_id,
                            SocketRecord::DebateError {
                                error: err.to_string(),
                            },
                        )
                        .await;
                    registry
                        .close_session(&task_session_id, CLOSE_INTERNAL_ERROR, "debate error")
                        .await;
                }
            }
        });

        StartedDebate {
            session_id,
            status: "started".to_string(),
            message: format!(
                "Debate started with {round_count} rounds. Connect to the socket channel for real-time updates."
            ),
        }
    }

    async fn handle(&self, session_id: &str) -> Result<SessionHandle, ServiceError> {
        self.store
            .get(session_id)
            .await
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))
    }

    /// Progress snapshot for a session.
    pub async fn status(&self, session_id: &str) -> Result<SessionStatusView, ServiceError> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;
        Ok(SessionStatusView {
            session_id: session.session_id.clone(),
            status: session.status,
            current_round: session.current_round_number(),
            total_rounds: session.rounds.len() as u32,
            messages_count: session.message_count(),
            design_prompt: session.design_prompt.clone(),
            created_at: session.created_at,
        })
    }

    /// Full session record snapshot.
    pub async fn result(&self, session_id: &str) -> Result<DebateSession, ServiceError> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await.clone();
        Ok(session)
    }

    /// Per-round transcripts.
    pub async fn rounds(&self, session_id: &str) -> Result<SessionRounds, ServiceError> {
        let handle = self.handle(session_id).await?;
        let session = handle.read().await;
        Ok(SessionRounds {
            session_id: session.session_id.clone(),
            rounds: session.rounds.clone(),
        })
    }

    /// Static roster and current limits.
    pub fn roster_info(&self) -> RosterInfo {
        RosterInfo {
            agents: self.roster.profiles().to_vec(),
            debate_settings: DebateLimits {
                max_rounds: self.settings.max_rounds,
                max_messages_per_round: self.settings.max_messages_per_round,
                max_message_chars: self.settings.max_message_chars,
            },
        }
    }
}
