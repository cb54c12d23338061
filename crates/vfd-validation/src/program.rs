//! Compiled animation scripts

use crate::animator::{Pacing, ScriptAnimator};
use crate::engine::{runtime_engine, sandbox_engine, ScriptError};
use crate::failure::ValidationFailure;
use rhai::{Dynamic, Scope, AST};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vfd_display::SharedDisplay;

/// Parameters every entry point takes: `(animator, duration)`
const ENTRY_ARITY: usize = 2;

/// Parse only, reporting the first syntax error
pub fn check_syntax(source: &str) -> Result<(), ValidationFailure> {
    sandbox_engine()
        .compile(source)
        .map(|_| ())
        .map_err(|e| ValidationFailure::SyntaxInvalid {
            line: e.1.line().unwrap_or(0),
            message: e.0.to_string(),
        })
}

/// A bound animation: function definitions only, entry point verified
#[derive(Clone)]
pub struct Program {
    entry_point: String,
    source: Arc<str>,
    ast: Arc<AST>,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("entry_point", &self.entry_point)
            .field("source_chars", &self.source.len())
            .finish()
    }
}

impl Program {
    /// Bind `source` into an isolated namespace
    ///
    /// Compiles with strict variables, so references to names that are never
    /// defined fail here rather than at runtime. Top-level statements are
    /// discarded; only function definitions survive.
    pub fn bind(source: &str, entry_point: &str) -> Result<Self, ValidationFailure> {
        let mut engine = sandbox_engine();
        engine.set_strict_variables(true);

        let ast = engine
            .compile(source)
            .map_err(|e| ValidationFailure::CompileFailure {
                message: e.to_string(),
            })?
            .clone_functions_only();

        let defined = ast
            .iter_functions()
            .any(|f| f.name == entry_point && f.params.len() == ENTRY_ARITY);
        if !defined {
            return Err(ValidationFailure::DefinitionMissing {
                name: entry_point.to_string(),
            });
        }

        Ok(Self {
            entry_point: entry_point.to_string(),
            source: Arc::from(source),
            ast: Arc::new(ast),
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Call the entry point with `animator` until it returns
    pub fn run(&self, animator: ScriptAnimator, duration: f64) -> Result<(), ScriptError> {
        let engine = runtime_engine(animator.cancel_flag());
        let mut scope = Scope::new();
        engine
            .call_fn::<Dynamic>(&mut scope, &self.ast, &self.entry_point, (animator, duration))
            .map(|_| ())
            .map_err(|e| ScriptError::from_eval(&e))
    }

    /// Play in real time against a live display
    ///
    /// Returns the number of frames written. Raising `cancel` stops the
    /// script at its next operation or sleep slice.
    pub fn play(
        &self,
        display: SharedDisplay,
        frame_rate: f64,
        duration: f64,
        cancel: Arc<AtomicBool>,
    ) -> Result<usize, ScriptError> {
        let animator = ScriptAnimator::new(display, frame_rate, Pacing::RealTime).with_cancel(cancel);
        let counter = animator.clone();
        self.run(animator, duration)?;
        Ok(counter.frames_written())
    }
}
