//! Why a candidate was rejected by the sandbox

use crate::engine::ScriptErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Longest crash message kept for retry context
pub const CRASH_MESSAGE_CHARS: usize = 100;

/// Sandbox rejection reasons, all retryable
#[derive(Debug, Clone, Error)]
pub enum ValidationFailure {
    #[error("Line {line}: {message}")]
    SyntaxInvalid { line: usize, message: String },

    #[error("Function {name}(animator, duration) not defined")]
    DefinitionMissing { name: String },

    #[error("{message}")]
    CompileFailure { message: String },

    #[error("{kind}: {message}")]
    RuntimeCrash {
        kind: ScriptErrorKind,
        message: String,
    },

    #[error("Timeout: animation hung (no completion within {:.1}s)", .timeout.as_secs_f64())]
    Hung { timeout: Duration },
}

impl ValidationFailure {
    /// Crash with the message cut to [`CRASH_MESSAGE_CHARS`]
    pub fn crash(kind: ScriptErrorKind, message: &str) -> Self {
        Self::RuntimeCrash {
            kind,
            message: vfd_core::truncate_chars(message, CRASH_MESSAGE_CHARS),
        }
    }

    pub fn is_hang(&self) -> bool {
        matches!(self, Self::Hung { .. })
    }
}
