//! Round seed templates and the truncation policy.
//!
//! Each round opens from exactly one template, selected by round number. Any
//! prior text injected into a template (the design prompt, the round-1
//! summary) is cut to its configured character budget first so a long prompt
//! cannot blow up the context handed to the engine.

use crate::config::DebateSettings;

/// Marker appended to text cut at its budget boundary.
pub const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED]";

/// Cut `text` at `max_chars` characters.
///
/// Text at or under budget passes through unchanged, so re-truncating an
/// already-truncated string with a larger budget is a no-op. Over-budget text
/// keeps the budget-length prefix, trimmed of trailing whitespace, with the
/// truncation marker appended.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max_chars).collect();
    format!("{}{}", prefix.trim_end(), TRUNCATION_MARKER)
}

/// The per-reply limits quoted inside every round seed.
pub fn brevity_rules(max_message_chars: usize) -> String {
    format!(
        "Rules (important): keep each reply <= {max_message_chars} chars; \
         no long preambles; do not repeat earlier messages verbatim."
    )
}

/// Seed message for a round, built from one of the three fixed templates.
///
/// `round_one_summary` is only read for round 2; rounds past 3 fall through
/// to the consensus template, though the session model never creates them.
pub fn round_seed(
    round_number: u32,
    design_prompt: &str,
    round_one_summary: &str,
    settings: &DebateSettings,
) -> String {
    let rules = brevity_rules(settings.max_message_chars);
    match round_number {
        1 => {
            let prompt = truncate_chars(design_prompt, settings.max_prompt_chars);
            format!(
                "## Design Challenge\n\n\
                 {prompt}\n\n\
                 {rules}\n\n\
                 Orchestrator: introduce challenge; ask Artist for 2-3 concepts; \
                 ask Critic/UX/Brand for fast feedback.\n\n\
                 IMPORTANT: DesignArtist MUST include at least one minimal valid \
                 <svg>...</svg> prototype for the best concept (raw SVG, no markdown fences)."
            )
        }
        2 => {
            let summary = if round_one_summary.is_empty() {
                "See previous round"
            } else {
                round_one_summary
            };
            let summary = truncate_chars(summary, settings.max_summary_chars);
            format!(
                "## Round 2: Refinement\n\n\
                 Summary so far:\n{summary}\n\n\
                 {rules}\n\n\
                 Orchestrator: ask Artist to revise; ask others to confirm/adjust; \
                 end with 3-5 bullet decisions."
            )
        }
        _ => format!(
            "## Round 3: Consensus\n\n\
             {rules}\n\n\
             Orchestrator: request final votes (Approve/Adjust/Rethink) + 1 sentence \
             reason each; then output final recommendation, score (1-10), and next steps."
        ),
    }
}

/// Corrective seed for the directed artifact request. Sent only when round 1
/// finished without a single SVG block.
pub fn artifact_request(design_prompt: &str) -> String {
    format!(
        "You are the DesignArtist.\n\n\
         MANDATORY: Provide ONE minimal valid SVG prototype for the best concept.\n\
         Output ONLY a raw <svg>...</svg> block. No markdown. No explanation.\n\n\
         Design challenge:\n{design_prompt}"
    )
}
