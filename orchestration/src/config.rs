//! Environment-backed settings for the debate service.
//!
//! Only two things are fatal at construction time: a missing provider API key
//! and an unsupported provider selection. Every numeric or boolean knob falls
//! back to its default when unset or unparsable.
//!
//! Free-tier and compact-context modes layer the defaults: free tier (on by
//! default for Gemini) trims rounds and turn caps to stay under a
//! requests-per-minute ceiling, compact context (on by default for Groq and
//! for free tier) shrinks the character budgets injected into round prompts.

use crate::engine::SpeakerSelection;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upstream LLM provider the debate agents talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Gemini,
    Groq,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Groq => write!(f, "groq"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Startup-fatal configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} not found in environment")]
    MissingCredentials { key: &'static str },
    #[error("unsupported provider {0:?}, use \"gemini\" or \"groq\"")]
    UnsupportedProvider(String),
}

/// Everything the debate service reads from the environment.
#[derive(Debug, Clone)]
pub struct DebateSettings {
    pub provider: Provider,
    /// Model name sent to the provider.
    pub model: String,
    /// Provider API key. Presence is validated here; only engine adapters
    /// consume it.
    pub api_key: String,
    /// Sampling temperature for agent replies.
    pub temperature: f64,
    /// Per-call timeout engine adapters should apply upstream.
    pub request_timeout: Duration,
    /// Free-tier mode: trimmed rounds and turn caps.
    pub free_tier: bool,
    /// Compact-context mode: reduced character budgets.
    pub compact_context: bool,
    /// Budget for the design prompt injected into round 1.
    pub max_prompt_chars: usize,
    /// Budget for the prior-round summary injected into round 2.
    pub max_summary_chars: usize,
    /// Per-reply budget quoted in the brevity rules.
    pub max_message_chars: usize,
    /// Configured round ceiling. Execution is pinned to the three fixed
    /// themes; this value surfaces in metadata and start messages.
    pub max_rounds: u32,
    /// Turn cap handed to the conversation engine per round.
    pub max_messages_per_round: u32,
    /// Speaker-selection policy for the exchange.
    pub speaker_selection: SpeakerSelection,
    /// Provider request ceiling used to derive the gate interval.
    pub requests_per_minute: u32,
    /// Minimum spacing between upstream calls, across all sessions.
    pub min_interval: Duration,
    /// Retry ceiling for rate-limited calls.
    pub max_retries: u32,
    /// Listen host for the embedding server.
    pub host: String,
    /// Preferred listen port; successors are tried when occupied.
    pub port: u16,
}

impl Default for DebateSettings {
    /// Gemini free-tier defaults with an empty API key, the shape
    /// `from_env` produces on a machine with only `GEMINI_API_KEY` set.
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            api_key: String::new(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(120),
            free_tier: true,
            compact_context: true,
            max_prompt_chars: 1500,
            max_summary_chars: 900,
            max_message_chars: 1200,
            max_rounds: 3,
            max_messages_per_round: 4,
            speaker_selection: SpeakerSelection::RoundRobin,
            requests_per_minute: 5,
            min_interval: Duration::from_secs(12),
            max_retries: 3,
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl DebateSettings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. `from_env` is the thin
    /// `std::env` wrapper; tests pass a map so they never touch process
    /// state.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = &get;

        // DEBATE_LLM_PROVIDER: "gemini" (default) or "groq"
        let provider: Provider = get("DEBATE_LLM_PROVIDER")
            .unwrap_or_else(|| "gemini".to_string())
            .parse()?;

        let (key_var, model_var, default_model) = match provider {
            Provider::Gemini => ("GEMINI_API_KEY", "GEMINI_MODEL", "gemini-2.5-flash"),
            Provider::Groq => ("GROQ_API_KEY", "GROQ_MODEL", "openai/gpt-oss-120b"),
        };

        let api_key = get(key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredentials { key: key_var })?;

        // DEBATE_MODEL overrides everything; otherwise the provider-specific
        // variable, otherwise the provider default.
        let model = get("DEBATE_MODEL")
            .or_else(|| get(model_var))
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model.to_string());

        // GEMINI_FREE_TIER_MODE: on by default, only meaningful for Gemini.
        let free_tier = provider == Provider::Gemini && env_flag(get, "GEMINI_FREE_TIER_MODE", true);

        // DEBATE_COMPACT_CONTEXT: on by default for Groq and free tier.
        let compact_context = env_flag(
            get,
            "DEBATE_COMPACT_CONTEXT",
            provider == Provider::Groq || free_tier,
        );

        let max_prompt_chars = env_parse(
            get,
            "DEBATE_MAX_USER_PROMPT_CHARS",
            if compact_context { 1500 } else { 6000 },
        );
        let max_summary_chars = env_parse(
            get,
            "DEBATE_MAX_SUMMARY_CHARS",
            if compact_context { 900 } else { 2500 },
        );
        let max_message_chars = env_parse(
            get,
            "DEBATE_MAX_AGENT_MESSAGE_CHARS",
            if compact_context { 1200 } else { 4000 },
        );

        let temperature = env_parse(
            get,
            "DEBATE_TEMPERATURE",
            match provider {
                Provider::Gemini => 0.7,
                Provider::Groq => 1.0,
            },
        );
        let request_timeout = Duration::from_secs(env_parse(get, "DEBATE_TIMEOUT", 120u64));

        let max_rounds = env_parse(get, "DEBATE_MAX_ROUNDS", if free_tier { 3 } else { 4 });
        let max_messages_per_round = env_parse(
            get,
            "DEBATE_MAX_MESSAGES_PER_ROUND",
            if compact_context {
                4
            } else if free_tier {
                3
            } else {
                10
            },
        );

        // DEBATE_SPEAKER_SELECTION_METHOD: "auto" costs extra LLM calls on
        // some backends, so constrained modes default to round robin.
        let speaker_selection = get("DEBATE_SPEAKER_SELECTION_METHOD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(if free_tier || compact_context {
                SpeakerSelection::RoundRobin
            } else {
                SpeakerSelection::Auto
            });

        // DEBATE_REQUESTS_PER_MINUTE: provider ceiling; the gate interval is
        // derived from it unless DEBATE_MIN_INTERVAL_SECONDS overrides.
        let requests_per_minute = env_parse(get, "DEBATE_REQUESTS_PER_MINUTE", 5u32);
        let min_interval = get("DEBATE_MIN_INTERVAL_SECONDS")
            .and_then(|s| s.parse::<f64>().ok())
            .map(Duration::from_secs_f64)
            .unwrap_or_else(|| {
                Duration::from_secs_f64(60.0 / f64::from(requests_per_minute.max(1)))
            });
        let max_retries = env_parse(get, "DEBATE_MAX_RETRIES", 3u32);

        // AGENTS_HOST/AGENTS_PORT take precedence over SERVER_HOST/SERVER_PORT.
        let host = get("AGENTS_HOST")
            .or_else(|| get("SERVER_HOST"))
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = get("AGENTS_PORT")
            .and_then(|s| s.parse().ok())
            .or_else(|| get("SERVER_PORT").and_then(|s| s.parse().ok()))
            .unwrap_or(8000);

        Ok(Self {
            provider,
            model,
            api_key,
            temperature,
            request_timeout,
            free_tier,
            compact_context,
            max_prompt_chars,
            max_summary_chars,
            max_message_chars,
            max_rounds,
            max_messages_per_round,
            speaker_selection,
            requests_per_minute,
            min_interval,
            max_retries,
            host,
            port,
        })
    }
}

fn env_flag(get: &dyn Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match get(key) {
        Some(raw) => matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        None => default,
    }
}

fn env_parse<T: std::str::FromStr>(
    get: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    get(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_gemini_free_tier_defaults() {
        let settings =
            DebateSettings::from_lookup(lookup(&[("GEMINI_API_KEY", "test-key")])).unwrap();
        assert_eq!(settings.provider, Provider::Gemini);
        assert_eq!(settings.model, "gemini-2.5-flash");
        assert!(settings.free_tier);
        assert!(settings.compact_context);
        assert_eq!(settings.max_prompt_chars, 1500);
        assert_eq!(settings.max_summary_chars, 900);
        assert_eq!(settings.max_message_chars, 1200);
        assert_eq!(settings.max_rounds, 3);
        assert_eq!(settings.max_messages_per_round, 4);
        assert_eq!(settings.speaker_selection, SpeakerSelection::RoundRobin);
        assert_eq!(settings.min_interval, Duration::from_secs(12));
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_free_tier_off_restores_full_budgets() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "test-key"),
            ("GEMINI_FREE_TIER_MODE", "0"),
        ]))
        .unwrap();
        assert!(!settings.free_tier);
        assert!(!settings.compact_context);
        assert_eq!(settings.max_prompt_chars, 6000);
        assert_eq!(settings.max_summary_chars, 2500);
        assert_eq!(settings.max_message_chars, 4000);
        assert_eq!(settings.max_rounds, 4);
        assert_eq!(settings.max_messages_per_round, 10);
        assert_eq!(settings.speaker_selection, SpeakerSelection::Auto);
    }

    #[test]
    fn test_groq_defaults() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("DEBATE_LLM_PROVIDER", "groq"),
            ("GROQ_API_KEY", "gsk-test"),
        ]))
        .unwrap();
        assert_eq!(settings.provider, Provider::Groq);
        assert_eq!(settings.model, "openai/gpt-oss-120b");
        assert!(!settings.free_tier);
        assert!(settings.compact_context);
        assert_eq!(settings.temperature, 1.0);
        assert_eq!(settings.max_messages_per_round, 4);
        assert_eq!(settings.speaker_selection, SpeakerSelection::RoundRobin);
    }

    #[test]
    fn test_debate_model_overrides_provider_model() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "test-key"),
            ("GEMINI_MODEL", "gemini-2.0-pro"),
            ("DEBATE_MODEL", "  gemini-exp  "),
        ]))
        .unwrap();
        assert_eq!(settings.model, "gemini-exp");
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = DebateSettings::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredentials {
                key: "GEMINI_API_KEY"
            }
        );

        let err = DebateSettings::from_lookup(lookup(&[
            ("DEBATE_LLM_PROVIDER", "groq"),
            ("GROQ_API_KEY", "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials { key: "GROQ_API_KEY" });
    }

    #[test]
    fn test_unsupported_provider_is_fatal() {
        let err = DebateSettings::from_lookup(lookup(&[("DEBATE_LLM_PROVIDER", "openai")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedProvider("openai".to_string()));
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_provider_parse_trims_and_lowers() {
        assert_eq!("  Gemini ".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("GROQ".parse::<Provider>().unwrap(), Provider::Groq);
    }

    #[test]
    fn test_explicit_interval_overrides_rpm() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("DEBATE_REQUESTS_PER_MINUTE", "30"),
            ("DEBATE_MIN_INTERVAL_SECONDS", "0.5"),
        ]))
        .unwrap();
        assert_eq!(settings.requests_per_minute, 30);
        assert_eq!(settings.min_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_interval_derived_from_rpm() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("DEBATE_REQUESTS_PER_MINUTE", "30"),
        ]))
        .unwrap();
        assert_eq!(settings.min_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_rpm_does_not_divide_by_zero() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("DEBATE_REQUESTS_PER_MINUTE", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.min_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_unparsable_numerics_fall_back() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("DEBATE_MAX_ROUNDS", "many"),
            ("DEBATE_TEMPERATURE", "warm"),
            ("DEBATE_MAX_USER_PROMPT_CHARS", ""),
        ]))
        .unwrap();
        assert_eq!(settings.max_rounds, 3);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_prompt_chars, 1500);
    }

    #[test]
    fn test_host_port_fallback_chain() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("SERVER_HOST", "0.0.0.0"),
            ("SERVER_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 9000);

        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("AGENTS_HOST", "10.0.0.1"),
            ("AGENTS_PORT", "8001"),
            ("SERVER_HOST", "0.0.0.0"),
            ("SERVER_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(settings.host, "10.0.0.1");
        assert_eq!(settings.port, 8001);
    }

    #[test]
    fn test_speaker_selection_override() {
        let settings = DebateSettings::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("DEBATE_SPEAKER_SELECTION_METHOD", "auto"),
        ]))
        .unwrap();
        assert_eq!(settings.speaker_selection, SpeakerSelection::Auto);
    }

    #[test]
    fn test_default_matches_free_tier_shape() {
        let settings = DebateSettings::default();
        assert_eq!(settings.provider, Provider::Gemini);
        assert!(settings.free_tier);
        assert_eq!(settings.min_interval, Duration::from_secs(12));
        assert_eq!(settings.max_messages_per_round, 4);
    }
}
