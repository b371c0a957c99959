use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, map_http_error, CompletionBackend, LlmError, SamplingOptions};

/// Client for a local Ollama server, using the chat endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: &'a SamplingOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
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

    /// Server version string
    pub async fn version(&self) -> Result<String, LlmError> {
        let response = self
            .http_client
            .get(format!("{}/api/version", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(map_http_error)?;

        let body: VersionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(body.version)
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(map_http_error)?;

        let body: TagsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: &self.options,
        };

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        let reply: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(reply.message.content.trim().to_string())
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let version = self.version().await?;
        tracing::info!(version = %version, "Ollama service is running");

        let models = self.list_models().await?;
        if !models.iter().any(|m| m == &self.model) {
            return Err(LlmError::ModelUnavailable {
                model: self.model.clone(),
                available: models,
            });
        }

        let reply = self.complete("Reply tersely.", "Respond with exactly: OK").await?;
        tracing::debug!(reply = %reply, "Ollama test prompt answered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let options = SamplingOptions::default();
        let request = ChatRequest {
            model: "qwen2.5-coder:7b",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            stream: false,
            options: &options,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen2.5-coder:7b");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_ctx"], 4096);
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{"model":"m","message":{"role":"assistant","content":"  SELECT 1  "},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content.trim(), "SELECT 1");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = OllamaClient::new(
            "http://localhost:11434/",
            "m",
            SamplingOptions::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "m");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        let client = OllamaClient::new(
            "http://127.0.0.1:9",
            "m",
            SamplingOptions::default(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::Request(_) | LlmError::Timeout(_)));
    }
}
