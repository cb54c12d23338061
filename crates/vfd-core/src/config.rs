//! Configuration management for the VFD agent
//!
//! Settings are layered: defaults, then an optional TOML file, then the
//! environment variables the agent has always honoured (`VFD_DEVICE`,
//! `OLLAMA_API_BASE`, `OLLAMA_MODEL`, `ANIMATION_DURATION`). The CLI applies
//! its flags last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, VfdError};

/// Device name that selects the console simulator instead of hardware
pub const SIMULATOR_DEVICE: &str = "simulator";

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vfd.toml";

/// Agent configuration, passed explicitly to every component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Serial device path, or `simulator`
    #[serde(default = "default_device")]
    pub device: String,

    /// Prompt file sent ahead of every generation request
    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,

    /// Optional `word:pos` vocabulary for idea phrases
    #[serde(default)]
    pub vocabulary_file: Option<PathBuf>,

    /// Where code, diagnostics, captures, state and telemetry are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Echo every frame to the console
    #[serde(default)]
    pub preview: bool,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Code-generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout for generation calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for the startup reachability check
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
}

/// Retry loop and queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Attempts per idea before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Work queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Recent distinct failures fed back into the next request
    #[serde(default = "default_error_context")]
    pub error_context: usize,

    /// Minimum length of an extracted function body
    #[serde(default = "default_min_body_chars")]
    pub min_body_chars: usize,
}

/// Sandbox validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Simulated animation duration handed to candidates
    #[serde(default = "default_simulated_duration_secs")]
    pub simulated_duration_secs: f64,

    /// Frame rate reported to candidates during validation
    #[serde(default = "default_validation_frame_rate")]
    pub frame_rate: f64,

    /// Wall-clock timeout as a multiple of the simulated duration
    #[serde(default = "default_hang_factor")]
    pub hang_factor: f64,
}

/// Live playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    /// How long the controller waits on an empty queue
    #[serde(default = "default_dequeue_timeout_secs")]
    pub dequeue_timeout_secs: f64,

    /// Placeholder animation ticks before re-polling the queue
    #[serde(default = "default_placeholder_ticks")]
    pub placeholder_ticks: usize,

    #[serde(default = "default_placeholder_tick_ms")]
    pub placeholder_tick_ms: u64,

    /// Pause after clearing between animations
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Extra time an animation may run past its duration before it is stopped
    #[serde(default = "default_overrun_grace_secs")]
    pub overrun_grace_secs: f64,
}

// Default value providers
fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("prompts/animation.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated_animations")
}

fn default_api_base() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:3b".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_num_predict() -> u32 {
    2048
}

fn default_num_ctx() -> u32 {
    8192
}

fn default_max_attempts() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    2
}

fn default_error_context() -> usize {
    3
}

fn default_min_body_chars() -> usize {
    50
}

fn default_simulated_duration_secs() -> f64 {
    1.0
}

fn default_validation_frame_rate() -> f64 {
    600.0
}

fn default_hang_factor() -> f64 {
    2.0
}

fn default_duration_secs() -> f64 {
    10.0
}

fn default_frame_rate() -> f64 {
    6.0
}

fn default_dequeue_timeout_secs() -> f64 {
    20.0
}

fn default_placeholder_ticks() -> usize {
    60
}

fn default_placeholder_tick_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    200
}

fn default_overrun_grace_secs() -> f64 {
    2.0
}

impl AgentConfig {
    /// Load configuration from `path`, or `vfd.toml` if present, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(VfdError::Config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| VfdError::Config(format!("Failed to parse config file: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply the environment variable overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(device) = lookup("VFD_DEVICE") {
            self.device = device;
        }
        if let Some(base) = lookup("OLLAMA_API_BASE") {
            self.service.api_base = base;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.service.model = model;
        }
        if let Some(duration) = lookup("ANIMATION_DURATION") {
            self.playback.duration_secs = duration.parse().map_err(|_| {
                VfdError::Config(format!("Invalid ANIMATION_DURATION: {}", duration))
            })?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_attempts == 0 {
            return Err(VfdError::Config("max_attempts must be at least 1".into()));
        }
        if self.generation.queue_capacity == 0 {
            return Err(VfdError::Config("queue_capacity must be at least 1".into()));
        }

        let playback = &self.playback;
        positive_seconds("playback duration", playback.duration_secs)?;
        positive("playback frame rate", playback.frame_rate)?;
        positive_seconds("dequeue timeout", playback.dequeue_timeout_secs)?;
        positive_seconds("overrun grace", playback.overrun_grace_secs)?;
        positive_seconds(
            "playback limit",
            playback.duration_secs + playback.overrun_grace_secs,
        )?;

        let validation = &self.validation;
        positive_seconds("validation duration", validation.simulated_duration_secs)?;
        positive("validation frame rate", validation.frame_rate)?;
        if validation.hang_factor.is_nan() || validation.hang_factor < 1.0 {
            return Err(VfdError::Config(format!(
                "hang_factor must be at least 1.0, got {}",
                validation.hang_factor
            )));
        }
        positive_seconds(
            "hang timeout",
            validation.simulated_duration_secs * validation.hang_factor,
        )?;
        Ok(())
    }

    pub fn is_simulator(&self) -> bool {
        self.device == SIMULATOR_DEVICE
    }

    /// Frames are captured during playback when previewing or simulating
    pub fn capture_playback(&self) -> bool {
        self.preview || self.is_simulator()
    }

    pub fn state_file(&self) -> PathBuf {
        self.output_dir.join("agent_state.json")
    }

    pub fn telemetry_dir(&self) -> PathBuf {
        self.output_dir.join("telemetry")
    }

    pub fn captures_dir(&self) -> PathBuf {
        self.output_dir.join("frame_captures")
    }
}

/// Finite and greater than zero; NaN fails the comparison
fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VfdError::Config(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

/// Positive and representable as a `Duration`
fn positive_seconds(name: &str, value: f64) -> Result<()> {
    positive(name, value)?;
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|_| VfdError::Config(format!("{} is out of range: {}s", name, value)))
}

impl ValidationConfig {
    /// Wall-clock deadline after which a candidate counts as hung
    pub fn hang_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.simulated_duration_secs * self.hang_factor)
    }
}

impl PlaybackConfig {
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.dequeue_timeout_secs)
    }

    pub fn placeholder_tick(&self) -> Duration {
        Duration::from_millis(self.placeholder_tick_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Wall-clock budget for one play: duration plus the overrun grace
    pub fn play_limit(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs + self.overrun_grace_secs)
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            prompt_file: default_prompt_file(),
            vocabulary_file: None,
            output_dir: default_output_dir(),
            preview: false,
            service: ServiceConfig::default(),
            generation: GenerationConfig::default(),
            validation: ValidationConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
            num_predict: default_num_predict(),
            num_ctx: default_num_ctx(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            queue_capacity: default_queue_capacity(),
            error_context: default_error_context(),
            min_body_chars: default_min_body_chars(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            simulated_duration_secs: default_simulated_duration_secs(),
            frame_rate: default_validation_frame_rate(),
            hang_factor: default_hang_factor(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            frame_rate: default_frame_rate(),
            dequeue_timeout_secs: default_dequeue_timeout_secs(),
            placeholder_ticks: default_placeholder_ticks(),
            placeholder_tick_ms: default_placeholder_tick_ms(),
            settle_ms: default_settle_ms(),
            overrun_grace_secs: default_overrun_grace_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_agent_constants() {
        let config = AgentConfig::default();
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.queue_capacity, 2);
        assert_eq!(config.playback.frame_rate, 6.0);
        assert_eq!(config.service.request_timeout_secs, 120);
        assert_eq!(config.validation.hang_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vfd.toml");
        std::fs::write(
            &path,
            "device = \"simulator\"\n[generation]\nmax_attempts = 3\n",
        )
        .unwrap();

        let config = AgentConfig::load_or_default(Some(&path)).unwrap();
        assert!(config.is_simulator());
        assert_eq!(config.generation.max_attempts, 3);
        // Unspecified fields keep their defaults
        assert_eq!(config.generation.queue_capacity, 2);
        assert_eq!(config.service.model, "qwen2.5-coder:3b");
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = TempDir::new().unwrap();
        let result = AgentConfig::load_or_default(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(VfdError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VFD_DEVICE", "simulator"),
            ("OLLAMA_MODEL", "tiny"),
            ("ANIMATION_DURATION", "4.5"),
        ]
        .into_iter()
        .collect();

        let mut config = AgentConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.device, "simulator");
        assert_eq!(config.service.model, "tiny");
        assert_eq!(config.playback.duration_secs, 4.5);
        assert_eq!(config.service.api_base, "http://localhost:11434");
    }

    #[test]
    fn test_invalid_duration_env() {
        let mut config = AgentConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "ANIMATION_DURATION").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let mut config = AgentConfig::default();
        config.generation.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    fn rejected(mutate: impl FnOnce(&mut AgentConfig)) -> bool {
        let mut config = AgentConfig::default();
        mutate(&mut config);
        matches!(config.validate(), Err(VfdError::Config(_)))
    }

    #[test]
    fn test_validate_rejects_non_finite_and_negative_values() {
        assert!(rejected(|c| c.validation.hang_factor = f64::NAN));
        assert!(rejected(|c| c.validation.hang_factor = f64::INFINITY));
        assert!(rejected(|c| c.playback.duration_secs = f64::NAN));
        assert!(rejected(|c| c.playback.duration_secs = f64::INFINITY));
        assert!(rejected(|c| c.playback.frame_rate = f64::NAN));
        assert!(rejected(|c| c.playback.dequeue_timeout_secs = -1.0));
        assert!(rejected(|c| c.playback.dequeue_timeout_secs = f64::NAN));
        assert!(rejected(|c| c.playback.overrun_grace_secs = 0.0));
        assert!(rejected(|c| c.validation.simulated_duration_secs = -0.5));
        assert!(rejected(|c| c.validation.frame_rate = f64::NAN));
        // Too large for a Duration
        assert!(rejected(|c| c.validation.simulated_duration_secs = f64::MAX));
        assert!(!rejected(|_| {}));
    }

    #[test]
    fn test_nan_duration_env_is_rejected_by_validate() {
        let mut config = AgentConfig::default();
        config
            .apply_overrides(|k| (k == "ANIMATION_DURATION").then(|| "NaN".to_string()))
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validated_durations_convert() {
        let config = AgentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.playback.dequeue_timeout(), Duration::from_secs(20));
        assert_eq!(config.playback.play_limit(), Duration::from_secs(12));
        assert_eq!(config.validation.frame_rate, 600.0);
    }

    #[test]
    fn test_capture_playback() {
        let mut config = AgentConfig::default();
        assert!(!config.capture_playback());
        config.preview = true;
        assert!(config.capture_playback());
        config.preview = false;
        config.device = SIMULATOR_DEVICE.to_string();
        assert!(config.capture_playback());
    }
}
