//! Ollama client for candidate generation
//!
//! Each request is stateless: the full system prompt, the idea and any retry
//! context travel with every call.

use crate::types::{
    GenerationFailure, GenerationRequest, OllamaOptions, OllamaRequest, OllamaResponse,
    TagsResponse,
};
use async_trait::async_trait;
use std::time::Duration;
use vfd_core::config::ServiceConfig;
use vfd_core::{truncate_chars, Result, VfdError};

/// Longest error body kept from a failed HTTP response
const ERROR_BODY_CHARS: usize = 200;

/// Anything that turns a request into candidate source text
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, GenerationFailure>;
}

/// Client for an Ollama-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    num_predict: u32,
    num_ctx: u32,
    health_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| VfdError::Service(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            num_predict: config.num_predict,
            num_ctx: config.num_ctx,
            health_timeout: config.health_timeout(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models the service has available
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.api_base))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| VfdError::Service(format!("Cannot reach {}: {}", self.api_base, e)))?;

        if !response.status().is_success() {
            return Err(VfdError::Service(format!(
                "{} answered {}",
                self.api_base,
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| VfdError::Service(format!("Invalid /api/tags response: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Verify the service is reachable and serves the configured model
    pub async fn health_check(&self) -> Result<()> {
        let models = self.list_models().await?;
        if models.iter().any(|name| model_matches(name, &self.model)) {
            tracing::debug!("Model {} available", self.model);
            Ok(())
        } else {
            Err(VfdError::ModelNotFound(format!(
                "{} (run: ollama pull {})",
                self.model, self.model
            )))
        }
    }
}

/// `llama3` matches `llama3:latest`; a tagged name must match exactly
fn model_matches(available: &str, wanted: &str) -> bool {
    if available == wanted {
        return true;
    }
    !wanted.contains(':')
        && available
            .strip_prefix(wanted)
            .is_some_and(|tag| tag.starts_with(':'))
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, GenerationFailure> {
        tracing::debug!(
            "Generate attempt {}: {}",
            request.attempt,
            request.description
        );

        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: request.render(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature(),
                num_predict: self.num_predict,
                num_ctx: self.num_ctx,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/generate", self.api_base))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(GenerationFailure::Status {
                status: status.as_u16(),
                body: truncate_chars(&text, ERROR_BODY_CHARS),
            });
        }

        let parsed: OllamaResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationFailure::Timeout
            } else {
                GenerationFailure::Decode(truncate_chars(&e.to_string(), ERROR_BODY_CHARS))
            }
        })?;

        if parsed.response.trim().is_empty() {
            return Err(GenerationFailure::Empty);
        }

        tracing::debug!(
            "Code received ({} chars, {} tokens)",
            parsed.response.len(),
            parsed.eval_count.unwrap_or(0)
        );
        Ok(parsed.response)
    }
}

fn classify_transport(e: reqwest::Error) -> GenerationFailure {
    if e.is_timeout() {
        GenerationFailure::Timeout
    } else {
        GenerationFailure::Transport(truncate_chars(&e.to_string(), 100))
    }
}
