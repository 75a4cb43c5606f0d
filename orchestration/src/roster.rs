//! Fixed participant roster for the design debate.
//!
//! Five profiles: one moderator (the Orchestrator) plus four participant
//! roles. The set and its speaking order never change at runtime; display
//! metadata (emoji, color, role label) rides along on every delivered
//! message.

use serde::{Deserialize, Serialize};

/// Name of the moderator profile.
pub const MODERATOR: &str = "Orchestrator";

/// Display metadata for one debate participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Participant name used in transcripts (e.g. "DesignArtist").
    pub name: String,
    /// Emoji shown next to the name.
    pub emoji: String,
    /// Hex display color.
    pub color: String,
    /// Human-readable role label.
    pub role: String,
}

impl AgentProfile {
    fn new(name: &str, emoji: &str, color: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            emoji: emoji.to_string(),
            color: color.to_string(),
            role: role.to_string(),
        }
    }

    /// Profile used for speakers outside the roster (e.g. "System").
    pub fn fallback(name: &str) -> Self {
        Self::new(name, "🤖", "#666", "Agent")
    }
}

/// The fixed debate roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    profiles: Vec<AgentProfile>,
}

impl Roster {
    /// Build the standard five-profile roster, moderator first, participants
    /// in speaking order.
    pub fn standard() -> Self {
        Self {
            profiles: vec![
                AgentProfile::new(MODERATOR, "🧠", "#6366F1", "Project Manager"),
                AgentProfile::new("DesignArtist", "🎨", "#10B981", "Design Artist"),
                AgentProfile::new("DesignCritic", "📝", "#EF4444", "Design Critic"),
                AgentProfile::new("UXResearcher", "📊", "#3B82F6", "UX Researcher"),
                AgentProfile::new("BrandStrategist", "💡", "#F59E0B", "Brand Strategist"),
            ],
        }
    }

    /// All profiles, moderator first.
    pub fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }

    /// Profile by name, or the generic fallback for unknown speakers.
    pub fn profile(&self, name: &str) -> AgentProfile {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .unwrap_or_else(|| AgentProfile::fallback(name))
    }

    /// Display role for a speaker name.
    pub fn role_of(&self, name: &str) -> String {
        self.profile(name).role
    }

    /// The moderator profile.
    pub fn moderator(&self) -> &AgentProfile {
        &self.profiles[0]
    }

    /// Non-moderator participants in speaking order.
    pub fn participants(&self) -> impl Iterator<Item = &AgentProfile> {
        self.profiles.iter().filter(|p| p.name != MODERATOR)
    }

    /// Participant names in speaking order, moderator excluded.
    pub fn participant_names(&self) -> Vec<String> {
        self.participants().map(|p| p.name.clone()).collect()
    }

    /// The participant expected to produce graphical artifacts.
    pub fn artist(&self) -> &AgentProfile {
        self.profiles
            .iter()
            .find(|p| p.name == "DesignArtist")
            .unwrap_or(&self.profiles[0])
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::standard()
    }
}
