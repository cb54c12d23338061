//! Type definitions for code-generation requests

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One request for candidate code
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System prompt describing the host API
    pub prompt: String,
    /// The idea to animate
    pub description: String,
    /// Entry point name the code must define
    pub function_id: String,
    /// 1-based attempt number within the idea's sequence
    pub attempt: usize,
    /// Recent distinct failures of earlier attempts, oldest first
    pub prior_errors: Vec<String>,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        description: impl Into<String>,
        function_id: impl Into<String>,
        attempt: usize,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            description: description.into(),
            function_id: function_id.into(),
            attempt,
            prior_errors: Vec::new(),
        }
    }

    pub fn with_prior_errors(mut self, errors: Vec<String>) -> Self {
        self.prior_errors = errors;
        self
    }

    pub fn temperature(&self) -> f64 {
        crate::prompt::temperature_for(self.attempt)
    }

    /// Full text sent to the model
    pub fn render(&self) -> String {
        crate::prompt::render(self)
    }
}

/// Why the service did not produce usable text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("Timeout")]
    Timeout,

    #[error("Error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty response")]
    Empty,

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Ollama `/api/generate` request body
#[derive(Debug, Clone, Serialize)]
pub struct OllamaRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: OllamaOptions,
}

/// Sampling options
#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    pub temperature: f64,
    pub num_predict: u32,
    pub num_ctx: u32,
}

/// Ollama `/api/generate` response body (non-streaming)
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

/// Ollama `/api/tags` response body
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = OllamaRequest {
            model: "qwen2.5-coder:3b".into(),
            prompt: "p".into(),
            stream: false,
            options: OllamaOptions {
                temperature: 0.8,
                num_predict: 2048,
                num_ctx: 8192,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 2048);
        assert_eq!(json["options"]["num_ctx"], 8192);
    }

    #[test]
    fn test_tags_tolerates_extra_fields() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"qwen2.5-coder:3b","size":123,"digest":"abc"}]}"#,
        )
        .unwrap();
        assert_eq!(tags.models[0].name, "qwen2.5-coder:3b");
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(GenerationFailure::Timeout.to_string(), "Timeout");
        assert_eq!(GenerationFailure::Empty.to_string(), "Empty response");
        assert_eq!(
            GenerationFailure::Status {
                status: 404,
                body: "model not found".into()
            }
            .to_string(),
            "HTTP 404: model not found"
        );
    }
}
