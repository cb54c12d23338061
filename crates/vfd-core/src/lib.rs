//! # vfd-core
//!
//! Core types for the VFD animation agent.
//!
//! The agent keeps a 20x2 vacuum fluorescent display busy with short
//! animations written by a code-generation model. Generated code is never
//! trusted: it is sanitized, compiled and executed in a sandbox before it is
//! allowed anywhere near the real display.
//!
//! ## Core Paradigm
//!
//! - An animation exists only once validation has succeeded
//! - The work queue is small on purpose (backpressure over work-ahead)
//! - Every idea ends in exactly one recorded outcome
//! - Operator feedback is edge-triggered and tied to the animation just played

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::AgentConfig;
pub use error::{Result, VfdError};
pub use types::*;
