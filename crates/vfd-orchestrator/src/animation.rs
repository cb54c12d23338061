//! Validated, playable animations

use chrono::{DateTime, Utc};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vfd_core::FunctionId;
use vfd_display::SharedDisplay;
use vfd_validation::{Program, ScriptError};

/// An animation that passed sandbox validation
///
/// Only the generator and replay loading construct these, both after a
/// clean sandbox run.
#[derive(Debug, Clone)]
pub struct Animation {
    pub function_id: FunctionId,
    pub idea: String,
    pub program: Program,
    pub created_at: DateTime<Utc>,
}

impl Animation {
    pub fn new(function_id: impl Into<String>, idea: impl Into<String>, program: Program) -> Self {
        Self {
            function_id: function_id.into(),
            idea: idea.into(),
            program,
            created_at: Utc::now(),
        }
    }

    /// Validated source text
    pub fn code(&self) -> &str {
        self.program.source()
    }

    /// Run against the live display in real time; blocks until done
    pub fn play(
        &self,
        display: SharedDisplay,
        frame_rate: f64,
        duration: f64,
        cancel: Arc<AtomicBool>,
    ) -> Result<usize, ScriptError> {
        self.program.play(display, frame_rate, duration, cancel)
    }
}
