//! OpenAI-compatible chat-completions client (Groq by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use warroom_core::AppConfig;

use crate::client::{ChatMessage, InferenceClient};
use crate::error::InferenceError;
use crate::retry::retry_with_backoff;

/// Error bodies are truncated to this many characters in [`InferenceError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct InferenceSettings {
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl InferenceSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.inference_base_url.clone(),
            api_key: config.inference_api_key.clone(),
            model: config.inference_model.clone(),
            timeout_secs: config.inference_timeout_secs,
            max_retries: config.inference_max_retries,
            backoff_base_ms: config.inference_retry_backoff_base_ms,
            temperature: config.inference_temperature,
            max_tokens: config.inference_max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completions client authenticated with a bearer key.
pub struct GroqClient {
    client: Client,
    settings: InferenceSettings,
    endpoint: String,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.settings.model)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl GroqClient {
    /// # Errors
    ///
    /// Returns [`InferenceError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(settings: InferenceSettings) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(InferenceError::ClientBuild)?;
        let endpoint = format!(
            "{}/chat/completions",
            settings.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            settings,
            endpoint,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    async fn send_once(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, self.settings.timeout_secs))?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(InferenceError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                reason: e.to_string(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| InferenceError::InvalidResponse {
                reason: "no message content in first choice".to_owned(),
            })
    }
}

#[async_trait]
impl InferenceClient for GroqClient {
    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        retry_with_backoff(
            self.settings.max_retries,
            self.settings.backoff_base_ms,
            || self.send_once(messages),
        )
        .await
    }
}
