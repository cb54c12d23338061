//! Locked-down Rhai engine construction and error classification

use crate::animator::ScriptAnimator;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Position, INT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Largest array a script may build
const MAX_ARRAY_SIZE: usize = 10_000;

/// Largest string a script may build
const MAX_STRING_SIZE: usize = 64 * 1024;

/// Coarse class of a script failure, used in retry context and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptErrorKind {
    IndexError,
    FunctionNotFound,
    NameError,
    TypeError,
    ArithmeticError,
    ResourceLimit,
    Terminated,
    Panic,
    RuntimeError,
}

impl std::fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IndexError => "IndexError",
            Self::FunctionNotFound => "FunctionNotFound",
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ArithmeticError => "ArithmeticError",
            Self::ResourceLimit => "ResourceLimit",
            Self::Terminated => "Terminated",
            Self::Panic => "Panic",
            Self::RuntimeError => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// A classified error raised while a script was running
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an engine error by its innermost cause
    pub fn from_eval(err: &EvalAltResult) -> Self {
        let root = root_cause(err);
        Self::new(classify(root), root.to_string())
    }
}

fn root_cause(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => root_cause(inner),
        other => other,
    }
}

fn classify(err: &EvalAltResult) -> ScriptErrorKind {
    match err {
        EvalAltResult::ErrorArrayBounds(..) | EvalAltResult::ErrorStringBounds(..) => {
            ScriptErrorKind::IndexError
        }
        EvalAltResult::ErrorFunctionNotFound(..) => ScriptErrorKind::FunctionNotFound,
        EvalAltResult::ErrorVariableNotFound(..) => ScriptErrorKind::NameError,
        EvalAltResult::ErrorMismatchDataType(..) | EvalAltResult::ErrorMismatchOutputType(..) => {
            ScriptErrorKind::TypeError
        }
        EvalAltResult::ErrorArithmetic(..) => ScriptErrorKind::ArithmeticError,
        EvalAltResult::ErrorTooManyOperations(..)
        | EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorDataTooLarge(..) => ScriptErrorKind::ResourceLimit,
        EvalAltResult::ErrorTerminated(..) => ScriptErrorKind::Terminated,
        _ => ScriptErrorKind::RuntimeError,
    }
}

/// Error value returned from host functions when the run was cancelled
pub(crate) fn terminated() -> Box<EvalAltResult> {
    EvalAltResult::ErrorTerminated(Dynamic::UNIT, Position::NONE).into()
}

/// Engine with the minimal host surface: no modules, no `eval`
///
/// Only the standard packages (math, strings, arrays) plus the animator and
/// randomness functions are reachable from scripts.
pub fn sandbox_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");
    engine.set_max_array_size(MAX_ARRAY_SIZE);
    engine.set_max_string_size(MAX_STRING_SIZE);

    engine.on_print(|text| debug!("script: {}", text));
    engine.on_debug(|text, _source, pos| debug!("script debug {}: {}", pos, text));

    register_animator(&mut engine);
    register_random(&mut engine);
    engine
}

/// Sandbox engine that aborts as soon as `cancel` is raised
pub fn runtime_engine(cancel: Arc<AtomicBool>) -> Engine {
    let mut engine = sandbox_engine();
    engine.on_progress(move |_ops| {
        if cancel.load(Ordering::Relaxed) {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });
    engine
}

fn register_animator(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptAnimator>("Animator");

    engine.register_fn(
        "write_frame",
        |animator: &mut ScriptAnimator, line1: ImmutableString, line2: ImmutableString| {
            animator.write_frame(line1.as_str(), line2.as_str())
        },
    );
    engine.register_fn("frame_sleep", |animator: &mut ScriptAnimator, seconds: f64| {
        animator.frame_sleep(seconds)
    });
    engine.register_fn("frame_sleep", |animator: &mut ScriptAnimator, seconds: INT| {
        animator.frame_sleep(seconds as f64)
    });
    engine.register_fn("clear", |animator: &mut ScriptAnimator| animator.clear());

    engine.register_get("frame_rate", |animator: &mut ScriptAnimator| animator.frame_rate());
    engine.register_get("elapsed", |animator: &mut ScriptAnimator| animator.elapsed());
}

fn register_random(engine: &mut Engine) {
    engine.register_fn("rand_float", || rand::random::<f64>());
    engine.register_fn("rand_int", |lo: INT, hi: INT| -> INT {
        use rand::Rng;
        if hi <= lo {
            lo
        } else {
            rand::rng().random_range(lo..=hi)
        }
    });
}
