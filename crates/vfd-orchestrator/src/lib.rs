//! # vfd-orchestrator
//!
//! The generation → validation → queue → playback pipeline.
//!
//! This crate provides:
//! - The [`Generator`] retry loop (producer) and its pure stage machine
//! - The bounded work queue with slot reservation for backpressure
//! - The [`DisplayController`] (consumer) with placeholder, feedback and
//!   capture handling, plus single-shot and replay loops
//! - Durable outcome state, failure diagnostics and the loading indicator

mod animation;
mod controller;
pub mod diagnostics;
mod generator;
mod progress;
mod queue;
mod replay;
mod shutdown;
mod stages;
mod state;

pub use animation::Animation;
pub use controller::{placeholder_text, wait_for_first, DisplayController, Phase};
pub use generator::{Generator, ProgressScale};
pub use progress::{render_complete, render_loading, run_loading_indicator, ProgressTracker};
pub use queue::{work_queue, QueueConsumer, QueueProducer, QueueSlot};
pub use replay::{find_scripts, load_scripts, ReplayItem};
pub use shutdown::Shutdown;
pub use stages::{advance, AttemptError, AttemptStage, ErrorHistory, StageResult};
pub use state::{AgentState, StateStore, HISTORY_LIMIT};
