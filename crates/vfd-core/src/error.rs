//! Unified error types for the VFD agent

use thiserror::Error;

/// Unified error type for all agent operations
#[derive(Error, Debug)]
pub enum VfdError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),

    // Display errors
    #[error("Display error: {0}")]
    Display(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No permission for device: {0}")]
    DevicePermission(String),

    // Generation service errors
    #[error("Generation service error: {0}")]
    Service(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    // Script errors
    #[error("Script error: {0}")]
    Script(String),

    #[error("Playback error: {0}")]
    Playback(String),

    // Pipeline errors
    #[error("Animation queue closed")]
    QueueClosed,

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using VfdError
pub type Result<T> = std::result::Result<T, VfdError>;
