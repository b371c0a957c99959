//! Text-generation backends.
//!
//! Everything above this module talks to a backend through one calling
//! convention, `complete(system, user)`. Each backend adapts it to its own
//! wire format (structured chat messages, or a single combined prompt).

pub mod ollama;
pub mod prompts;
pub mod retry;
pub mod text;

pub use ollama::OllamaClient;
pub use retry::{RetryPolicy, Retrying};
pub use text::TextCompletionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A black-box text-generation service
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate a reply to `user` under the instructions in `system`
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Short backend name used in logs and health output
    fn name(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str;

    /// Verify the backend is reachable and serves the configured model
    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Sampling parameters forwarded to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    /// Maximum tokens to generate
    pub num_predict: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    /// Context window
    pub num_ctx: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            num_predict: 1024,
            top_p: 0.9,
            repeat_penalty: 1.05,
            num_ctx: 4096,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Backend timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Model '{model}' not available (found: {})", available.join(", "))]
    ModelUnavailable {
        model: String,
        available: Vec<String>,
    },
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout(_))
    }
}

pub(crate) fn map_http_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(error.to_string())
    } else if error.is_decode() {
        LlmError::Decode(error.to_string())
    } else {
        LlmError::Request(error.to_string())
    }
}

/// Turn a non-success response into `LlmError::Status`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(LlmError::Status { status, body })
}
