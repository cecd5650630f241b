//! OpenAI-compatible reviewer
//!
//! Works with OpenAI, Azure-style gateways, and local servers exposing the
//! chat completions API (Ollama, vLLM, etc.).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use codescope_core::config::ReviewerConfig;

use crate::domain::{ModelReviewer, ReviewerError};
use crate::infrastructure::prompts::REVIEWER_SYSTEM_PROMPT;

/// Reviewer backed by a `/chat/completions` endpoint
pub struct OpenAiCompatibleReviewer {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiCompatibleReviewer {
    pub fn new(model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client with custom timeout, using default client");
                Client::new()
            });

        Self {
            client,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    pub fn from_config(config: &ReviewerConfig) -> Result<Self, ReviewerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ReviewerError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelReviewer for OpenAiCompatibleReviewer {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: REVIEWER_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending review request");

        let mut req = self.client.post(self.chat_url()).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => ReviewerError::Authentication(text),
                429 => ReviewerError::rate_limited(text, retry_after),
                code if code >= 500 => ReviewerError::ServiceUnavailable(format!("{status}: {text}")),
                _ => {
                    error!(status = %status, "Reviewer API error: {}", text);
                    ReviewerError::InvalidRequest(format!("API error {}: {}", status, text))
                }
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ReviewerError::InvalidResponse("Response contained no choices".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// === Chat completions wire types ===

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
