//! Response classification.
//!
//! The system prompt asks for strict JSON, but models pad, wrap, and
//! chat around it. The classifier recovers the structured payload when
//! one exists and degrades to plain text when it does not — parse
//! failure is never an error, only a downgrade.

use serde::{Deserialize, Serialize};
use tracing::debug;
use wegweiser_config::Protocol;

/// One recommended study program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Name of the study program
    pub title: String,

    /// Expected income, kept free-form ("55.000-70.000 EUR")
    pub income: String,

    /// Why this program fits the student
    pub reasoning: String,
}

/// The structured final answer the system prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
}

/// What a completed assistant turn turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// A parseable recommendation payload.
    Structured(RecommendationSet),

    /// A final plain-text answer.
    Final(String),

    /// A question for the human (markers protocol only).
    Question(String),

    /// Neither final nor a question; surfaced as-is.
    Intermediate(String),
}

const PAUSE_MARKER: &str = "[PAUSE_FOR_INPUT]";
const COMPLETE_MARKER: &str = "[TASK_COMPLETE]";

/// Classify a completed assistant turn.
///
/// Under [`Protocol::ToolCalls`] a terminating turn is by definition
/// final, so the outcome is either `Structured` or `Final`. Under
/// [`Protocol::Markers`] the literal markers decide, and are stripped
/// from the surfaced text.
pub fn classify(content: &str, protocol: &Protocol) -> Classified {
    match protocol {
        Protocol::ToolCalls => match parse_recommendations(content) {
            Some(set) => Classified::Structured(set),
            None => Classified::Final(content.to_string()),
        },
        Protocol::Markers => {
            // Completion outranks a pause when a message carries both.
            if content.contains(COMPLETE_MARKER) {
                let text = strip_marker(content, COMPLETE_MARKER);
                match parse_recommendations(&text) {
                    Some(set) => Classified::Structured(set),
                    None => Classified::Final(text),
                }
            } else if content.contains(PAUSE_MARKER) {
                Classified::Question(strip_marker(content, PAUSE_MARKER))
            } else {
                Classified::Intermediate(content.to_string())
            }
        }
    }
}

fn strip_marker(content: &str, marker: &str) -> String {
    content.replace(marker, "").trim().to_string()
}

/// Try to read a recommendation set out of model output.
///
/// Three stages: the whole string as JSON, then the first balanced
/// `{...}` region embedded in surrounding prose, then give up. The
/// extracted object must actually deserialize into the expected shape —
/// any old JSON object does not count.
fn parse_recommendations(content: &str) -> Option<RecommendationSet> {
    let trimmed = content.trim();
    if let Ok(set) = serde_json::from_str::<RecommendationSet>(trimmed) {
        return Some(set);
    }
    let embedded = extract_json_object(trimmed)?;
    match serde_json::from_str::<RecommendationSet>(&embedded) {
        Ok(set) => {
            debug!("Recovered recommendation payload embedded in prose");
            Some(set)
        }
        Err(_) => None,
    }
}

/// Find the first balanced top-level `{...}` region in `text`.
///
/// Brace counting is string-aware: braces inside JSON string literals
/// (including escaped quotes) do not affect the depth.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
