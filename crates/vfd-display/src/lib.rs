//! # vfd-display
//!
//! Everything that touches the operator's side of the agent:
//!
//! - The [`Display`] abstraction and its backends (CD5220 serial device,
//!   console simulator, in-memory capture, preview mirror)
//! - Frame recordings persisted as JSON lines
//! - The raw-mode keyboard listener that turns key presses into
//!   edge-triggered feedback signals

mod capture;
mod console;
mod device;
mod display;
mod keyboard;
mod mirror;

pub use capture::{CapturingDisplay, FrameLog, FrameRecording, FrameStats};
pub use console::ConsoleDisplay;
pub use device::Cd5220Display;
pub use display::{lock_display, shared, Display, SharedDisplay};
pub use keyboard::{classify_key, KeySignal, KeySignals, KeyboardListener};
pub use mirror::MirroredDisplay;
