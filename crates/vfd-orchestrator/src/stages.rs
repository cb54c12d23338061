//! Pure state machine for one idea's attempt sequence
//!
//! No I/O here. The generator performs each stage and feeds the result back
//! through [`advance`], which decides where the sequence goes next.
//!
//! - Any stage failure ends the attempt: `Retry` while budget remains,
//!   `Exhausted` otherwise
//! - Terminal stages absorb further events

use thiserror::Error;
use vfd_agent::GenerationFailure;
use vfd_validation::{SanitizeError, ValidationFailure};

/// Where an attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    Requesting,
    Sanitizing,
    SyntaxChecking,
    Binding,
    RuntimeValidating,
    Success,
    Retry,
    Exhausted,
}

impl AttemptStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Retry | Self::Exhausted)
    }
}

/// Result of performing the current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageResult {
    Passed,
    Failed,
}

/// Next stage for `attempt` (1-based) out of `budget`
pub fn advance(stage: AttemptStage, result: StageResult, attempt: usize, budget: usize) -> AttemptStage {
    use AttemptStage::*;

    if stage.is_terminal() {
        return stage;
    }
    match result {
        StageResult::Passed => match stage {
            Requesting => Sanitizing,
            Sanitizing => SyntaxChecking,
            SyntaxChecking => Binding,
            Binding => RuntimeValidating,
            RuntimeValidating => Success,
            terminal => terminal,
        },
        StageResult::Failed if attempt < budget => Retry,
        StageResult::Failed => Exhausted,
    }
}

/// Tagged failure of a single attempt
///
/// The rendered text is what the model sees as retry context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("Gen[{attempt}]: {failure}")]
    Generation {
        attempt: usize,
        failure: GenerationFailure,
    },

    #[error("Sanitize: {0}")]
    Sanitize(SanitizeError),

    #[error("Save: {0}")]
    Save(String),

    #[error("Syntax: {0}")]
    Syntax(String),

    #[error("Bind: {0}")]
    Bind(String),

    #[error("Compile: {0}")]
    Compile(String),

    #[error("Runtime: {0}")]
    Runtime(String),
}

impl AttemptError {
    /// The stage that produced this error
    pub fn stage(&self) -> AttemptStage {
        match self {
            Self::Generation { .. } => AttemptStage::Requesting,
            Self::Sanitize(_) => AttemptStage::Sanitizing,
            Self::Syntax(_) => AttemptStage::SyntaxChecking,
            Self::Bind(_) | Self::Compile(_) => AttemptStage::Binding,
            // The code is saved once the runtime check has passed
            Self::Runtime(_) | Self::Save(_) => AttemptStage::RuntimeValidating,
        }
    }
}

impl From<ValidationFailure> for AttemptError {
    fn from(failure: ValidationFailure) -> Self {
        let text = failure.to_string();
        match failure {
            ValidationFailure::SyntaxInvalid { .. } => Self::Syntax(text),
            ValidationFailure::DefinitionMissing { .. } => Self::Bind(text),
            ValidationFailure::CompileFailure { .. } => {
                Self::Compile(vfd_core::truncate_chars(&text, 100))
            }
            ValidationFailure::RuntimeCrash { .. } | ValidationFailure::Hung { .. } => {
                Self::Runtime(text)
            }
        }
    }
}

/// Failures of the current idea, oldest first
#[derive(Debug, Clone, Default)]
pub struct ErrorHistory {
    entries: Vec<String>,
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: &AttemptError) {
        self.entries.push(error.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The latest `count` distinct errors, oldest first
    pub fn recent_distinct(&self, count: usize) -> Vec<String> {
        let mut picked: Vec<String> = Vec::with_capacity(count);
        for entry in self.entries.iter().rev() {
            if picked.len() == count {
                break;
            }
            if !picked.contains(entry) {
                picked.push(entry.clone());
            }
        }
        picked.reverse();
        picked
    }
}
