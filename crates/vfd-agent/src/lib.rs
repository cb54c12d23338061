//! # vfd-agent
//!
//! Talks to the code-generation service and decides what to ask it for.
//!
//! - [`GenerationClient`]: the seam the retry loop generates through, with
//!   [`OllamaClient`] as the production implementation
//! - Prompt rendering with retry context and per-attempt temperature
//! - [`IdeaSource`]: vocabulary-driven idea phrases or a fixed idea
//!
//! Every request is stateless. Nothing about earlier ideas leaks into a new
//! one; only the failures of the current idea's earlier attempts are sent
//! back as context.

mod client;
mod ideas;
mod prompt;
mod types;

pub use client::{GenerationClient, OllamaClient};
pub use ideas::{FixedIdea, IdeaSource, Vocabulary, VocabularyIdeas};
pub use prompt::{load_prompt, temperature_for};
pub use types::*;
