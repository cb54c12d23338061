//! Core type definitions for the VFD agent

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Character columns per display row
pub const FRAME_WIDTH: usize = 20;

/// Maximum characters of error text kept on a recorded outcome
pub const OUTCOME_ERROR_CHARS: usize = 200;

/// Identifier of a generated animation (also its script entry point)
pub type FunctionId = String;

/// Create a fresh entry point name: `anim_<unix seconds>_<4 digits>`
pub fn new_function_id() -> FunctionId {
    let suffix: u32 = rand::rng().random_range(1000..10000);
    format!("anim_{}_{}", Utc::now().timestamp(), suffix)
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Clamp or pad a line to exactly [`FRAME_WIDTH`] characters
pub fn normalize_line(line: &str) -> String {
    let mut out: String = line.chars().take(FRAME_WIDTH).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(FRAME_WIDTH - len));
    out
}

/// Center text within a display row
pub fn center_line(text: &str) -> String {
    let text: String = text.chars().take(FRAME_WIDTH).collect();
    let len = text.chars().count();
    let left = (FRAME_WIDTH - len) / 2;
    let mut out = " ".repeat(left);
    out.push_str(&text);
    normalize_line(&out)
}

/// One display state: two fixed-width rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub line1: String,
    pub line2: String,
}

impl Frame {
    /// Build a frame, normalizing both rows to the display width
    pub fn new(line1: &str, line2: &str) -> Self {
        Self {
            line1: normalize_line(line1),
            line2: normalize_line(line2),
        }
    }

    pub fn blank() -> Self {
        Self::new("", "")
    }

    pub fn is_empty(&self) -> bool {
        self.line1.trim().is_empty() && self.line2.trim().is_empty()
    }

    pub fn uses_both_rows(&self) -> bool {
        !self.line1.trim().is_empty() && !self.line2.trim().is_empty()
    }
}

/// Terminal status of one idea's attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Record of how an idea's generation ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "function")]
    pub function_id: FunctionId,
    #[serde(rename = "description")]
    pub idea: String,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub attempts: usize,
    #[serde(default)]
    pub error: String,
}

impl GenerationOutcome {
    pub fn success(function_id: impl Into<String>, idea: impl Into<String>, attempts: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            function_id: function_id.into(),
            idea: idea.into(),
            status: OutcomeStatus::Success,
            attempts,
            error: String::new(),
        }
    }

    /// Failure outcome; the error text is truncated to [`OUTCOME_ERROR_CHARS`]
    pub fn failure(
        function_id: impl Into<String>,
        idea: impl Into<String>,
        attempts: usize,
        error: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            function_id: function_id.into(),
            idea: idea.into(),
            status: OutcomeStatus::Failure,
            attempts,
            error: truncate_chars(error, OUTCOME_ERROR_CHARS),
        }
    }
}

/// Operator feedback signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Bookmark,
    Downvote,
}

impl std::fmt::Display for PreferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bookmark => write!(f, "bookmark"),
            Self::Downvote => write!(f, "downvote"),
        }
    }
}

/// Feedback tied to the animation that was playing when the key was pressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "generation_id")]
    pub animation_id: FunctionId,
    pub idea: String,
    #[serde(rename = "message")]
    pub kind: PreferenceKind,
}

impl PreferenceEvent {
    pub fn new(kind: PreferenceKind, animation_id: impl Into<String>, idea: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            animation_id: animation_id.into(),
            idea: idea.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_id_shape() {
        let id = new_function_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "anim");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("abc").len(), FRAME_WIDTH);
        assert_eq!(normalize_line("abc"), format!("abc{}", " ".repeat(17)));
        assert_eq!(normalize_line(&"x".repeat(30)), "x".repeat(20));
        // Multibyte characters count as one column each
        assert_eq!(normalize_line("█").chars().count(), FRAME_WIDTH);
    }

    #[test]
    fn test_center_line() {
        let line = center_line("LOADING");
        assert_eq!(line.chars().count(), FRAME_WIDTH);
        assert_eq!(line.trim(), "LOADING");
        assert!(line.starts_with("      "));
    }

    #[test]
    fn test_frame_row_usage() {
        assert!(Frame::blank().is_empty());
        assert!(!Frame::new("*", "").is_empty());
        assert!(!Frame::new("*", "").uses_both_rows());
        assert!(Frame::new("*", "o").uses_both_rows());
    }

    #[test]
    fn test_failure_outcome_truncates_error() {
        let long = "e".repeat(500);
        let outcome = GenerationOutcome::failure("anim_1_1234", "idea", 5, &long);
        assert_eq!(outcome.error.len(), OUTCOME_ERROR_CHARS);
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert_eq!(outcome.attempts, 5);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_preference_event_serialization() {
        let event = PreferenceEvent::new(PreferenceKind::Bookmark, "anim_1_1234", "falling stars");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["message"], "bookmark");
        assert_eq!(json["generation_id"], "anim_1_1234");
        assert_eq!(json["idea"], "falling stars");
    }
}
