//! Append-only JSONL telemetry
//!
//! Two files under the telemetry directory:
//! - `events.jsonl`: generation outcomes and operator preference events
//! - `training.jsonl`: prompt/response pairs of accepted animations

use crate::code_metrics::CodeMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use vfd_core::{PreferenceEvent, PreferenceKind, Result};

pub const EVENTS_FILE: &str = "events.jsonl";
pub const TRAINING_FILE: &str = "training.jsonl";

/// One idea's generation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub generation_id: String,
    pub idea: String,
    pub success: bool,
    pub attempt: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub metrics: Option<CodeMetrics>,
}

impl GenerationEvent {
    pub fn success(id: &str, idea: &str, attempt: usize, metrics: CodeMetrics) -> Self {
        Self {
            timestamp: Utc::now(),
            message: "generation".to_string(),
            generation_id: id.to_string(),
            idea: idea.to_string(),
            success: true,
            attempt,
            error: None,
            metrics: Some(metrics),
        }
    }

    pub fn failure(id: &str, idea: &str, attempt: usize, error: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            message: "generation".to_string(),
            generation_id: id.to_string(),
            idea: idea.to_string(),
            success: false,
            attempt,
            error: Some(error.to_string()),
            metrics: None,
        }
    }
}

/// Accepted prompt/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub response: String,
    pub metadata: CodeMetrics,
}

impl TrainingExample {
    pub fn new(idea: &str, response: &str, metadata: CodeMetrics) -> Self {
        Self {
            timestamp: Utc::now(),
            prompt: format!(
                "Create VFD animation: {} (spatial patterns and full 20x2 display).",
                idea
            ),
            response: response.to_string(),
            metadata,
        }
    }
}

/// Writes telemetry records, one JSON object per line
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    dir: PathBuf,
}

impl TelemetrySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    pub fn training_path(&self) -> PathBuf {
        self.dir.join(TRAINING_FILE)
    }

    pub async fn log_generation(&self, event: &GenerationEvent) -> Result<()> {
        self.append(&self.events_path(), &serde_json::to_value(event)?)
            .await
    }

    pub async fn log_training_example(&self, example: &TrainingExample) -> Result<()> {
        self.append(&self.training_path(), &serde_json::to_value(example)?)
            .await
    }

    /// Preference events carry a `bookmarked` or `downvoted` flag
    pub async fn log_preference(&self, event: &PreferenceEvent) -> Result<()> {
        let mut record = serde_json::to_value(event)?;
        let flag = match event.kind {
            PreferenceKind::Bookmark => "bookmarked",
            PreferenceKind::Downvote => "downvoted",
        };
        if let Value::Object(map) = &mut record {
            map.insert(flag.to_string(), Value::Bool(true));
        }
        self.append(&self.events_path(), &record).await
    }

    /// Every record in `events.jsonl`, skipping lines that fail to parse
    pub async fn read_events(&self) -> Result<Vec<Value>> {
        let path = self.events_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }

    async fn append(&self, path: &Path, record: &Value) -> Result<()> {
        let line = serde_json::to_string(record)?;

        fs::create_dir_all(&self.dir).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;

        debug!("Telemetry record appended to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze_code;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_generation_events_append() {
        let dir = TempDir::new().unwrap();
        let sink = TelemetrySink::new(dir.path().join("telemetry"));

        let metrics = analyze_code("fn a(animator, d) { animator.write_frame(\"*\", \"\"); }", "a");
        sink.log_generation(&GenerationEvent::success("a", "stars", 2, metrics))
            .await
            .unwrap();
        sink.log_generation(&GenerationEvent::failure("b", "rain", 5, "Syntax: Line 1: x"))
            .await
            .unwrap();

        let events = sink.read_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["success"], true);
        assert_eq!(events[0]["attempt"], 2);
        // Metrics are flattened into the event
        assert!(events[0]["code_hash"].is_string());
        assert!(events[0].get("error").is_none());
        assert_eq!(events[1]["error"], "Syntax: Line 1: x");
        assert!(events[1].get("code_hash").is_none());
    }

    #[tokio::test]
    async fn test_preference_and_training_records() {
        let dir = TempDir::new().unwrap();
        let sink = TelemetrySink::new(dir.path());

        sink.log_preference(&PreferenceEvent::new(PreferenceKind::Downvote, "anim_1_1000", "snow"))
            .await
            .unwrap();
        let events = sink.read_events().await.unwrap();
        assert_eq!(events[0]["message"], "downvote");
        assert_eq!(events[0]["downvoted"], true);
        assert_eq!(events[0]["generation_id"], "anim_1_1000");

        let example = TrainingExample::new("snow", "fn x() {}", analyze_code("fn x() {}", "x"));
        sink.log_training_example(&example).await.unwrap();
        let training = std::fs::read_to_string(sink.training_path()).unwrap();
        assert_eq!(training.lines().count(), 1);
        assert!(training.contains("Create VFD animation: snow"));
    }

    #[tokio::test]
    async fn test_read_events_without_file() {
        let dir = TempDir::new().unwrap();
        let sink = TelemetrySink::new(dir.path().join("none"));
        assert!(sink.read_events().await.unwrap().is_empty());
    }
}
