//! Round orchestrator — drives a session through its three fixed rounds.
//!
//! One orchestrator task owns each running session and is its only writer.
//! Per round: build the seed, run one bounded exchange through the engine,
//! then replay the transcript in order, appending messages and firing the
//! delivery callback. The exchange is batch-replayed after it completes;
//! the real-time feel comes from rounds being short and sequential.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{artifact, consensus, prompts};
use crate::config::DebateSettings;
use crate::engine::{ConversationEngine, EngineError, ExchangeRequest};
use crate::events::EventSink;
use crate::roster::Roster;
use crate::session::store::SessionHandle;
use crate::session::types::{AgentMessage, DebateRound, RoundStatus, SessionStatus, TransitionError};

/// Message length above which a message counts as a round summary candidate.
const SUMMARY_CANDIDATE_CHARS: usize = 200;
/// Maximum characters kept in a round summary.
const SUMMARY_MAX_CHARS: usize = 500;

/// Failures that end a debate run.
#[derive(Debug, Error)]
pub enum DebateError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("session has no round {0}")]
    UnknownRound(u32),
}

/// Drives sessions through their rounds against one conversation engine.
pub struct RoundOrchestrator<E> {
    engine: E,
    roster: Roster,
    settings: DebateSettings,
}

impl<E: ConversationEngine> RoundOrchestrator<E> {
    pub fn new(engine: E, roster: Roster, settings: DebateSettings) -> Self {
        Self {
            engine,
            roster,
            settings,
        }
    }

    /// The engine this orchestrator runs exchanges through.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the session to completion or failure.
    ///
    /// On success the consensus is stored on the session and the status ends
    /// at completed. On any unrecovered error the session is marked failed, a
    /// terminal "System" message goes out through the sink, and the error is
    /// returned to the spawning task.
    pub async fn run(
        &self,
        handle: &SessionHandle,
        sink: &dyn EventSink,
    ) -> Result<(), DebateError> {
        let session_id = {
            let mut session = handle.write().await;
            session.advance(SessionStatus::InProgress)?;
            session.session_id.clone()
        };
        info!(session_id = %session_id, "debate started");

        match self.run_rounds(handle, sink).await {
            Ok(()) => {
                let mut session = handle.write().await;
                let result = consensus::calculate_consensus(&session, &self.roster);
                session.final_score = result.score;
                session.consensus = Some(result);
                session.advance(SessionStatus::Completed)?;
                session.completed_at = Some(Utc::now());
                info!(
                    session_id = %session_id,
                    final_score = session.final_score,
                    "debate completed"
                );
                Ok(())
            }
            Err(err) => {
                error!(session_id = %session_id, error = %err, "debate failed");
                {
                    let mut session = handle.write().await;
                    if let Err(transition) = session.advance(SessionStatus::Failed) {
                        warn!(session_id = %session_id, error = %transition, "could not mark session failed");
                    }
                }
                sink.message("System", &format!("Debate failed: {err}"), 0)
                    .await;
                Err(err)
            }
        }
    }

    /// Rounds run strictly in order; round n+1 never starts before round n is
    /// marked complete.
    async fn run_rounds(
        &self,
        handle: &SessionHandle,
        sink: &dyn EventSink,
    ) -> Result<(), DebateError> {
        let round_count = handle.read().await.rounds.len() as u32;
        for round_number in 1..=round_count {
            self.run_round(handle, round_number, sink).await?;
        }
        Ok(())
    }

    async fn run_round(
        &self,
        handle: &SessionHandle,
        round_number: u32,
        sink: &dyn EventSink,
    ) -> Result<(), DebateError> {
        let seed = {
            let mut session = handle.write().await;
            let design_prompt = session.design_prompt.clone();
            let round_one_summary = session
                .round(1)
                .map(|round| round.summary.clone())
                .unwrap_or_default();
            let round = session
                .round_mut(round_number)
                .ok_or(DebateError::UnknownRound(round_number))?;
            round.advance(RoundStatus::InProgress)?;
            prompts::round_seed(round_number, &design_prompt, &round_one_summary, &self.settings)
        };

        debug!(round = round_number, "running exchange");
        let transcript = self
            .engine
            .run_exchange(ExchangeRequest {
                seed,
                participants: self.roster.participant_names(),
                moderator: self.roster.moderator().name.clone(),
                max_turns: self.settings.max_messages_per_round,
                speaker_selection: self.settings.speaker_selection,
            })
            .await?;

        // Batch replay in transcript order, skipping empty entries.
        for entry in transcript.entries() {
            if entry.content.is_empty() {
                continue;
            }
            self.append_and_deliver(handle, round_number, &entry.speaker, &entry.content, sink)
                .await?;
        }

        if round_number == 1 {
            self.ensure_artifact(handle, sink).await;
        }

        {
            let mut session = handle.write().await;
            let round = session
                .round_mut(round_number)
                .ok_or(DebateError::UnknownRound(round_number))?;
            round.summary = summarize_round(round);
            round.advance(RoundStatus::Complete)?;
        }
        debug!(round = round_number, "round complete");
        Ok(())
    }

    /// Append a message to the round and fire the delivery callback.
    async fn append_and_deliver(
        &self,
        handle: &SessionHandle,
        round_number: u32,
        speaker: &str,
        content: &str,
        sink: &dyn EventSink,
    ) -> Result<(), DebateError> {
        let role = self.roster.role_of(speaker);
        {
            let mut session = handle.write().await;
            let round = session
                .round_mut(round_number)
                .ok_or(DebateError::UnknownRound(round_number))?;
            round
                .messages
                .push(AgentMessage::discussion(speaker, &role, content, round_number));
        }
        sink.message(speaker, content, round_number).await;
        Ok(())
    }

    /// Mandatory-artifact enforcement for round 1.
    ///
    /// When the exchange produced no SVG block, issue exactly one corrective
    /// request directed at the artist. Every failure here is swallowed: the
    /// round proceeds without an artifact rather than failing the session.
    async fn ensure_artifact(&self, handle: &SessionHandle, sink: &dyn EventSink) {
        let (design_prompt, contents) = {
            let session = handle.read().await;
            let contents: Vec<String> = session
                .round(1)
                .map(|round| round.messages.iter().map(|m| m.content.clone()).collect())
                .unwrap_or_default();
            (session.design_prompt.clone(), contents)
        };
        if artifact::contains_svg(contents.iter().map(String::as_str)) {
            return;
        }

        let artist = self.roster.artist().clone();
        info!(artist = %artist.name, "round 1 produced no artifact, requesting one");
        let request = prompts::artifact_request(&prompts::truncate_chars(
            &design_prompt,
            self.settings.max_prompt_chars,
        ));

        let reply = match self.engine.reply_as(&artist.name, &request).await {
            Ok(transcript) => transcript,
            Err(err) => {
                warn!(error = %err, "corrective artifact request failed, continuing without one");
                return;
            }
        };
        let Some(text) = reply.last_non_empty() else {
            warn!("corrective artifact reply was empty, continuing without one");
            return;
        };
        let text = text.trim();
        // Keep the raw reply when no block can be extracted from it.
        let content = artifact::extract_svg_blocks([text])
            .into_iter()
            .next()
            .unwrap_or_else(|| text.to_string());
        if content.is_empty() {
            return;
        }
        if let Err(err) = self
            .append_and_deliver(handle, 1, &artist.name, &content, sink)
            .await
        {
            warn!(error = %err, "could not append corrective artifact");
        }
    }
}

/// Round summary heuristic: the most recent message long enough to count as
/// substantial, truncated with an ellipsis when still over the ceiling.
pub fn summarize_round(round: &DebateRound) -> String {
    if round.messages.is_empty() {
        return "No discussion recorded.".to_string();
    }
    for message in round.messages.iter().rev() {
        let length = message.content.chars().count();
        if length > SUMMARY_CANDIDATE_CHARS {
            return if length > SUMMARY_MAX_CHARS {
                let prefix: String = message.content.chars().take(SUMMARY_MAX_CHARS).collect();
                format!("{prefix}...")
            } else {
                message.content.clone()
            };
        }
    }
    "Round completed with team discussion.".to_string()
}
