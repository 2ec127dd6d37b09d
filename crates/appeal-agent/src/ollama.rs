use appeal_core::{GenerationParams, GenerationService, ServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{classify_send_error, classify_status, http_client};

const SYSTEM_PROMPT: &str = "You draft parking citation appeal material. \
Use only the facts you are given and never invent evidence.";

/// Calls a locally-hosted Ollama model via its native chat API.
///
/// Case facts never leave the machine, which suits people who would rather
/// not send citation details to a hosted model.
pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[async_trait]
impl GenerationService for OllamaBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        let request_body = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                OllamaMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };

        info!(
            model = %self.model,
            base_url = %self.base_url,
            "calling ollama chat API"
        );

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let client = http_client(self.timeout_secs)?;

        let response = match client.post(&url).json(&request_body).send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    warn!(timeout_secs = self.timeout_secs, "ollama request timed out");
                } else {
                    warn!("ollama request failed: {}", e);
                }
                return Err(classify_send_error(&e, self.timeout_secs));
            },
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "ollama returned non-200: {}", body);
            return Err(classify_status(status, &body));
        }

        let parsed: OllamaChatResponse = response.json().await.map_err(|e| {
            warn!("failed to parse ollama response: {}", e);
            ServiceError::Unavailable(format!("malformed ollama response: {e}"))
        })?;

        let output = parsed.message.content;
        if output.trim().is_empty() {
            return Err(ServiceError::Unavailable("ollama returned empty output".into()));
        }
        info!(model = %self.model, output_len = output.len(), "ollama response received");
        Ok(output)
    }
}
