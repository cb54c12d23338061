//! # vfd-validation
//!
//! Turns untrusted model output into something safe to play.
//!
//! This crate provides:
//! - The textual [`Sanitizer`] that extracts the entry point
//! - A locked-down Rhai engine (no modules, no `eval`) with the animator API
//! - Syntax checking and binding into a [`Program`]
//! - The [`SandboxValidator`] that runs a candidate under a hard deadline and
//!   classifies crash, hang and success

mod animator;
mod engine;
mod failure;
mod program;
mod sandbox;
mod sanitizer;

pub use animator::{Pacing, ScriptAnimator};
pub use engine::{ScriptError, ScriptErrorKind};
pub use failure::{ValidationFailure, CRASH_MESSAGE_CHARS};
pub use program::{check_syntax, Program};
pub use sandbox::{SandboxValidator, ValidationReport};
pub use sanitizer::{CleanedCode, SanitizeError, Sanitizer, DEFAULT_MIN_BODY_CHARS, REQUIRED_CALL};
