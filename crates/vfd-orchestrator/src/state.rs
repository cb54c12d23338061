//! Durable record of generation outcomes
//!
//! One lock covers both mutation and the write to disk, so the file always
//! holds a consistent snapshot. Persisting is fail-open: a full disk costs
//! the history, never the pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use vfd_core::fail_open::fail_open_blocking;
use vfd_core::{GenerationOutcome, OutcomeStatus, Result, VfdError};

/// Outcomes kept in the history window
pub const HISTORY_LIMIT: usize = 100;

/// Snapshot written to `agent_state.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub generations: Vec<GenerationOutcome>,
    /// Lifetime success count, independent of the history window
    #[serde(default)]
    pub success: usize,
    #[serde(default)]
    pub failure: usize,
}

impl AgentState {
    fn apply(&mut self, outcome: GenerationOutcome) {
        match outcome.status {
            OutcomeStatus::Success => self.success += 1,
            OutcomeStatus::Failure => self.failure += 1,
        }
        self.generations.push(outcome);
        if self.generations.len() > HISTORY_LIMIT {
            let excess = self.generations.len() - HISTORY_LIMIT;
            self.generations.drain(..excess);
        }
    }
}

/// Thread-safe owner of the agent state file
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<AgentState>,
}

impl StateStore {
    /// Load from `path`; a missing or unreadable file starts empty
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                debug!("State file {} unreadable ({}), starting fresh", path.display(), e);
                AgentState::default()
            }),
            Err(_) => AgentState::default(),
        };
        Self {
            path,
            inner: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an outcome and persist the snapshot
    pub fn record(&self, outcome: GenerationOutcome) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        state.apply(outcome);
        fail_open_blocking("state save", || persist(&self.path, &state));
    }

    /// [`StateStore::record`] on a blocking worker, for async callers
    pub async fn record_async(self: &Arc<Self>, outcome: GenerationOutcome) {
        let store = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || store.record(outcome)).await {
            warn!("State update task failed: {}", e);
        }
    }

    pub fn snapshot(&self) -> AgentState {
        self.inner
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Compact `✓S ✗F` counter line
    pub fn stats(&self) -> String {
        let (success, failure) = self
            .inner
            .lock()
            .map(|s| (s.success, s.failure))
            .unwrap_or((0, 0));
        format!("✓{} ✗{}", success, failure)
    }
}

fn persist(path: &Path, state: &AgentState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)
        .map_err(|e| VfdError::Other(format!("writing {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counters_outlive_history_window() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(dir.path().join("agent_state.json"));

        for i in 0..130 {
            store.record(GenerationOutcome::success(format!("anim_{}", i), "idea", 1));
        }
        for i in 0..20 {
            store.record(GenerationOutcome::failure(format!("bad_{}", i), "idea", 5, "x"));
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.success, 130);
        assert_eq!(snapshot.failure, 20);
        assert_eq!(snapshot.generations.len(), HISTORY_LIMIT);
        // Oldest entries were dropped
        assert_eq!(snapshot.generations[0].function_id, "anim_50");
        assert_eq!(store.stats(), "✓130 ✗20");
    }

    #[test]
    fn test_persisted_snapshot_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("agent_state.json");

        let store = StateStore::load(&path);
        store.record(GenerationOutcome::success("anim_1_1000", "rain", 2));
        store.record(GenerationOutcome::failure("anim_2_2000", "snow", 5, "Gen[5]: Timeout"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["success"], 1);
        assert_eq!(raw["failure"], 1);
        assert_eq!(raw["generations"][1]["function"], "anim_2_2000");
        assert_eq!(raw["generations"][1]["status"], "failure");

        let reloaded = StateStore::load(&path);
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[tokio::test]
    async fn test_record_async_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_state.json");
        let store = Arc::new(StateStore::load(&path));

        store
            .record_async(GenerationOutcome::success("anim_1_1000", "rain", 1))
            .await;
        store
            .record_async(GenerationOutcome::failure("anim_2_2000", "snow", 5, "x"))
            .await;

        assert_eq!(store.stats(), "✓1 ✗1");
        let reloaded = StateStore::load(&path);
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StateStore::load(&path);
        assert_eq!(store.snapshot(), AgentState::default());
        assert_eq!(store.stats(), "✓0 ✗0");
    }
}
