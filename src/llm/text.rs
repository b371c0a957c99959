use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, map_http_error, CompletionBackend, LlmError, SamplingOptions};

/// Client for OpenAI-compatible `/v1/completions` servers that take one
/// plain prompt (text-generation-inference, vLLM, llama.cpp server).
#[derive(Debug, Clone)]
pub struct TextCompletionClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Fold a system/user pair into one instruction-style prompt
pub fn format_completion_prompt(system: &str, user: &str) -> String {
    format!(
        "System: {}\n\nUser: {}\n\nAssistant:",
        system.trim(),
        user.trim()
    )
}

impl TextCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        options: SamplingOptions,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            options,
        })
    }
}

#[async_trait]
impl CompletionBackend for TextCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            prompt: format_completion_prompt(system, user),
            max_tokens: self.options.num_predict,
            temperature: self.options.temperature,
            top_p: self.options.top_p,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/completions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        let body: CompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()))
    }

    fn name(&self) -> &str {
        "text-completion"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(map_http_error)?;

        let models: ModelsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        let available: Vec<String> = models.data.into_iter().map(|m| m.id).collect();
        // Single-model servers may report an alias id
        if available.len() > 1 && !available.iter().any(|id| id == &self.model) {
            return Err(LlmError::ModelUnavailable {
                model: self.model.clone(),
                available,
            });
        }
        Ok(())
    }
}
