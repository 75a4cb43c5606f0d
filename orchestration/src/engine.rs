//! Conversation-engine boundary.
//!
//! The orchestrator never talks to a provider directly. It hands an
//! [`ExchangeRequest`] to a [`ConversationEngine`] implementation and gets
//! back a [`Transcript`], the single canonical shape for exchange results.
//! Engine failures carry enough structure for the rate gate to classify them
//! without string matching at call sites.
//!
//! [`GatedEngine`] is the injection point for cross-session throttling: wrap
//! any engine in it and every call waits its turn and retries rate limits.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;

use crate::rate_gate::RateGate;

/// Regex for the delay hint some providers put in the error text
/// (e.g. "Please retry in 12.5s").
static RETRY_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry in\s+(\d+(?:\.\d+)?)s").expect("RETRY_IN_RE regex should compile")
});

/// How the engine picks the next speaker during an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerSelection {
    /// Strict rotation through the participant list.
    RoundRobin,
    /// Engine-chosen next speaker. Costs extra LLM calls on some backends.
    Auto,
}

impl std::fmt::Display for SpeakerSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for SpeakerSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "round_robin" | "round-robin" => Ok(Self::RoundRobin),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown speaker selection: {other}")),
        }
    }
}

/// One (speaker, content) pair in an exchange transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    pub content: String,
}

/// Ordered transcript of one exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (speaker, content) pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut transcript = Self::new();
        for (speaker, content) in pairs {
            transcript.push(speaker, content);
        }
        transcript
    }

    /// Append an entry.
    pub fn push(&mut self, speaker: &str, content: &str) {
        self.entries.push(TranscriptEntry {
            speaker: speaker.to_string(),
            content: content.to_string(),
        });
    }

    /// Entries in exchange order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content of the latest entry whose content is non-empty.
    pub fn last_non_empty(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.content.is_empty())
            .map(|e| e.content.as_str())
    }
}

/// One bounded multi-party exchange: fixed participants, one moderator,
/// a turn cap, and a seed message to start from.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    /// Seed message that opens the exchange.
    pub seed: String,
    /// Participant names in speaking order, moderator excluded.
    pub participants: Vec<String>,
    /// Moderator name.
    pub moderator: String,
    /// Maximum number of turns in the exchange.
    pub max_turns: u32,
    /// Speaker-selection policy.
    pub speaker_selection: SpeakerSelection,
}

/// Failures surfaced by a conversation engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The upstream provider rejected or failed the call.
    #[error("provider error: {message}")]
    Provider {
        /// HTTP-ish status when the adapter saw one.
        status: Option<u16>,
        /// Explicit retry-after hint when the adapter captured one.
        retry_after: Option<Duration>,
        message: String,
    },
    /// The exchange failed inside the engine itself.
    #[error("exchange failed: {0}")]
    Exchange(String),
}

impl EngineError {
    /// Provider failure without an explicit retry hint.
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            retry_after: None,
            message: message.into(),
        }
    }

    /// Attach an explicit retry-after hint (e.g. from a response header).
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        if let Self::Provider { retry_after, .. } = &mut self {
            *retry_after = Some(delay);
        }
        self
    }

    /// Whether this is a rate-limit signal: a 429 status, or one of the
    /// provider's quota markers in the message.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::Provider {
                status: Some(429), ..
            } => true,
            Self::Provider { message, .. } => {
                let msg = message.to_lowercase();
                msg.contains("429")
                    || msg.contains("resource_exhausted")
                    || msg.contains("quota exceeded")
            }
            Self::Exchange(_) => false,
        }
    }

    /// Provider-suggested retry delay: the explicit hint when present, else
    /// the "retry in Ns" pattern in the message text.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider {
                retry_after: Some(delay),
                ..
            } => Some(*delay),
            Self::Provider { message, .. } => RETRY_IN_RE
                .captures(message)
                .and_then(|caps| caps[1].parse::<f64>().ok())
                .map(Duration::from_secs_f64),
            Self::Exchange(_) => None,
        }
    }
}

/// External collaborator that executes bounded exchanges among named
/// participants.
///
/// Implementations that wrap blocking provider clients must run those calls
/// on `tokio::task::spawn_blocking`; the orchestrator awaits these methods
/// from per-session tasks and the runtime must never be blocked on an
/// upstream network call.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    /// Run one bounded exchange from a seed message and return the ordered
    /// transcript.
    async fn run_exchange(&self, request: ExchangeRequest) -> Result<Transcript, EngineError>;

    /// Directed exchange: one seed message, one named participant, one reply.
    async fn reply_as(&self, participant: &str, seed: &str) -> Result<Transcript, EngineError>;
}

#[async_trait]
impl<E: ConversationEngine + ?Sized> ConversationEngine for Arc<E> {
    async fn run_exchange(&self, request: ExchangeRequest) -> Result<Transcript, EngineError> {
        (**self).run_exchange(request).await
    }

    async fn reply_as(&self, participant: &str, seed: &str) -> Result<Transcript, EngineError> {
        (**self).reply_as(participant, seed).await
    }
}

/// Decorator that pushes every engine call through a shared [`RateGate`].
///
/// The gate is injected per instance, so initialization stays idempotent:
/// wrapping twice yields two decorators sharing one gate, never a
/// double-throttled client.
pub struct GatedEngine<E> {
    inner: E,
    gate: Arc<RateGate>,
}

impl<E> GatedEngine<E> {
    pub fn new(inner: E, gate: Arc<RateGate>) -> Self {
        Self { inner, gate }
    }

    /// The shared gate behind this decorator.
    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }
}

#[async_trait]
impl<E: ConversationEngine> ConversationEngine for GatedEngine<E> {
    async fn run_exchange(&self, request: ExchangeRequest) -> Result<Transcript, EngineError> {
        self.gate
            .call_with_retry(|| self.inner.run_exchange(request.clone()))
            .await
    }

    async fn reply_as(&self, participant: &str, seed: &str) -> Result<Transcript, EngineError> {
        self.gate
            .call_with_retry(|| self.inner.reply_as(participant, seed))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_status_429_is_rate_limit() {
        let err = EngineError::provider(Some(429), "Too Many Requests");
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_quota_markers_are_rate_limits() {
        assert!(EngineError::provider(None, "RESOURCE_EXHAUSTED: slow down").is_rate_limit());
        assert!(EngineError::provider(None, "Quota exceeded for model").is_rate_limit());
        assert!(EngineError::provider(None, "got HTTP 429 from upstream").is_rate_limit());
    }

    #[test]
    fn test_other_errors_are_not_rate_limits() {
        assert!(!EngineError::provider(Some(500), "internal error").is_rate_limit());
        assert!(!EngineError::Exchange("engine burped".to_string()).is_rate_limit());
    }

    #[test]
    fn test_retry_after_parses_message_hint() {
        let err = EngineError::provider(Some(429), "Please retry in 7s");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));

        let err = EngineError::provider(Some(429), "RETRY IN 2.5s (quota exceeded)");
        assert_eq!(err.retry_after(), Some(Duration::from_secs_f64(2.5)));
    }

    #[test]
    fn test_explicit_retry_after_wins_over_message() {
        let err = EngineError::provider(Some(429), "retry in 99s")
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_retry_after_none_without_hint() {
        assert_eq!(EngineError::provider(Some(429), "slow down").retry_after(), None);
        assert_eq!(EngineError::Exchange("broken".to_string()).retry_after(), None);
    }

    #[test]
    fn test_transcript_last_non_empty() {
        let transcript = Transcript::from_pairs(&[
            ("Orchestrator", "welcome"),
            ("DesignArtist", "<svg/>"),
            ("DesignCritic", ""),
        ]);
        assert_eq!(transcript.last_non_empty(), Some("<svg/>"));

        let empty = Transcript::from_pairs(&[("A", ""), ("B", "")]);
        assert_eq!(empty.last_non_empty(), None);
    }

    #[test]
    fn test_speaker_selection_parse() {
        assert_eq!(
            "round_robin".parse::<SpeakerSelection>().unwrap(),
            SpeakerSelection::RoundRobin
        );
        assert_eq!(
            "Round-Robin".parse::<SpeakerSelection>().unwrap(),
            SpeakerSelection::RoundRobin
        );
        assert_eq!(
            "auto".parse::<SpeakerSelection>().unwrap(),
            SpeakerSelection::Auto
        );
        assert!("debate".parse::<SpeakerSelection>().is_err());
    }

    struct FlakyEngine {
        failures_left: Mutex<u32>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ConversationEngine for FlakyEngine {
        async fn run_exchange(&self, _request: ExchangeRequest) -> Result<Transcript, EngineError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(EngineError::provider(Some(429), "quota exceeded"));
            }
            Ok(Transcript::from_pairs(&[("Orchestrator", "done")]))
        }

        async fn reply_as(&self, _participant: &str, _seed: &str) -> Result<Transcript, EngineError> {
            self.run_exchange(ExchangeRequest {
                seed: String::new(),
                participants: vec![],
                moderator: String::new(),
                max_turns: 1,
                speaker_selection: SpeakerSelection::RoundRobin,
            })
            .await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gated_engine_retries_rate_limits() {
        let engine = GatedEngine::new(
            FlakyEngine {
                failures_left: Mutex::new(1),
                calls: Mutex::new(0),
            },
            Arc::new(RateGate::new(Duration::ZERO, 3)),
        );
        let request = ExchangeRequest {
            seed: "go".to_string(),
            participants: vec!["DesignArtist".to_string()],
            moderator: "Orchestrator".to_string(),
            max_turns: 4,
            speaker_selection: SpeakerSelection::RoundRobin,
        };

        let transcript = engine.run_exchange(request).await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(*engine.inner.calls.lock().unwrap(), 2);
    }
}
