//! Ollama chat client.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use async_trait::async_trait;
use wyrm_core::{CallPolicy, GenerationConfig, Generator, Result, WyrmError};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Generator backed by a local Ollama server.
///
/// Calls `POST {endpoint}/api/chat` with streaming disabled and returns the
/// assistant message content.
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    policy: CallPolicy,
}

impl OllamaGenerator {
    /// Create a generator from configuration.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_policy(&config.endpoint, &config.model, config.policy())
    }

    /// Create a generator with an explicit call policy.
    pub fn with_policy(endpoint: &str, model: &str, policy: CallPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| WyrmError::generation_unavailable(format!("HTTP client: {}", e)))?;

        info!("Generator ready: model={}, endpoint={}", model, endpoint);

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            policy,
        })
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                WyrmError::generation_unavailable(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.endpoint, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = format!("Ollama API error {}: {}", status, body_text);
            // A rejected request (unknown model, bad body) fails the same way on retry.
            return Err(if is_permanent(status) {
                WyrmError::invalid_argument(message)
            } else {
                WyrmError::generation_unavailable(message)
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            WyrmError::generation_unavailable(format!("Invalid Ollama response: {}", e))
        })?;

        Ok(parsed.message.content)
    }
}

/// Client errors other than timeouts and rate limits.
fn is_permanent(status: reqwest::StatusCode) -> bool {
    status.is_client_error()
        && status != reqwest::StatusCode::REQUEST_TIMEOUT
        && status != reqwest::StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Generating with {} ({} prompt bytes)", self.model, prompt.len());

        self.policy
            .run("generate", || self.chat(prompt))
            .await
            .map_err(|e| match e {
                WyrmError::GenerationUnavailable { .. } => e,
                WyrmError::InvalidArgument { message } => {
                    WyrmError::generation_unavailable(message)
                }
                other => WyrmError::generation_unavailable(other.to_string()),
            })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
