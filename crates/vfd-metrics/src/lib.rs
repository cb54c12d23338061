//! # vfd-metrics
//!
//! Telemetry for the VFD animation agent.
//!
//! This crate provides:
//! - Static code metrics over accepted animations
//! - The append-only JSONL telemetry sink (events and training examples)

mod code_metrics;
mod telemetry;

pub use code_metrics::{analyze_code, CodeMetrics};
pub use telemetry::{GenerationEvent, TelemetrySink, TrainingExample, EVENTS_FILE, TRAINING_FILE};
