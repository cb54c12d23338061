//! Frame capture: in-memory recording and JSONL persistence
//!
//! Recording files start with a `{"_meta": {...}}` header line followed by
//! one `{"frame": n, "line1": .., "line2": ..}` object per frame.

use crate::Display;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use vfd_core::{Frame, Result, VfdError};

/// Shared, append-only list of captured frames
#[derive(Debug, Clone)]
pub struct FrameLog {
    id: String,
    inner: Arc<Mutex<Session>>,
}

#[derive(Debug)]
struct Session {
    started_at: DateTime<Utc>,
    frames: Vec<Frame>,
}

/// Summary statistics over a recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub total_frames: usize,
    pub non_empty_frames: usize,
    pub both_rows_active: usize,
    pub empty_ratio: f64,
    pub both_rows_ratio: f64,
}

impl FrameStats {
    pub fn from_frames(frames: &[Frame]) -> Self {
        if frames.is_empty() {
            return Self {
                empty_ratio: 1.0,
                ..Self::default()
            };
        }
        let total = frames.len();
        let non_empty = frames.iter().filter(|f| !f.is_empty()).count();
        let both = frames.iter().filter(|f| f.uses_both_rows()).count();
        Self {
            total_frames: total,
            non_empty_frames: non_empty,
            both_rows_active: both,
            empty_ratio: 1.0 - non_empty as f64 / total as f64,
            both_rows_ratio: both as f64 / total as f64,
        }
    }
}

impl FrameLog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Arc::new(Mutex::new(Session {
                started_at: Utc::now(),
                frames: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn push(&self, frame: Frame) {
        if let Ok(mut session) = self.inner.lock() {
            session.frames.push(frame);
        }
    }

    /// Snapshot of everything captured so far
    pub fn frames(&self) -> Vec<Frame> {
        self.inner
            .lock()
            .map(|s| s.frames.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop captured frames and restart the session clock (all handles)
    pub fn clear(&self) {
        if let Ok(mut session) = self.inner.lock() {
            session.frames.clear();
            session.started_at = Utc::now();
        }
    }

    fn started_at(&self) -> DateTime<Utc> {
        self.inner
            .lock()
            .map(|s| s.started_at)
            .unwrap_or_else(|_| Utc::now())
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats::from_frames(&self.frames())
    }

    /// Persist the capture, merging `metadata` into the header
    pub fn save_jsonl(&self, path: &Path, metadata: Value) -> Result<()> {
        let frames = self.frames();
        let started_at = self.started_at();
        let mut meta = Map::new();
        meta.insert("animation_id".into(), json!(self.id));
        meta.insert("created_at".into(), json!(started_at.to_rfc3339()));
        meta.insert("total_frames".into(), json!(frames.len()));
        meta.insert(
            "duration".into(),
            json!((Utc::now() - started_at).num_milliseconds() as f64 / 1000.0),
        );
        if let Value::Object(extra) = metadata {
            meta.extend(extra);
        }
        FrameRecording {
            meta: Value::Object(meta),
            frames,
        }
        .save(path)
    }
}

/// A recording loaded from or written to disk
#[derive(Debug, Clone)]
pub struct FrameRecording {
    pub meta: Value,
    pub frames: Vec<Frame>,
}

#[derive(Serialize, Deserialize)]
struct FrameLine {
    frame: usize,
    line1: String,
    line2: String,
}

impl FrameRecording {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut out, &json!({ "_meta": self.meta }))?;
        out.write_all(b"\n")?;
        for (index, frame) in self.frames.iter().enumerate() {
            let line = FrameLine {
                frame: index,
                line1: frame.line1.clone(),
                line2: frame.line2.clone(),
            };
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| VfdError::Capture(format!("{} is empty", path.display())))??;
        let mut header: Value = serde_json::from_str(&header)?;
        let meta = header
            .get_mut("_meta")
            .map(Value::take)
            .ok_or_else(|| VfdError::Capture(format!("Invalid JSONL format in {}", path.display())))?;

        let mut frames = Vec::new();
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: FrameLine = serde_json::from_str(&line)?;
            frames.push(Frame::new(&parsed.line1, &parsed.line2));
        }
        Ok(Self { meta, frames })
    }
}

/// Display that records every frame instead of showing it
#[derive(Debug, Clone)]
pub struct CapturingDisplay {
    log: FrameLog,
}

impl CapturingDisplay {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            log: FrameLog::new(id),
        }
    }

    /// Handle that stays valid after the display is moved into a shared slot
    pub fn log(&self) -> FrameLog {
        self.log.clone()
    }
}

impl Display for CapturingDisplay {
    fn write_frame(&mut self, line1: &str, line2: &str) -> Result<()> {
        self.log.push(Frame::new(line1, line2));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}
