//! Client for the assisted text-matching service.
//!
//! The service is any OpenAI-compatible chat-completions endpoint. It is
//! asked for a JSON object and its raw content is handed back; interpreting
//! that content is the job of [`crate::matcher::AssistedMatcher`].

use crate::config::{AssistConfig, FetchConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A service that answers a system/user prompt pair with a JSON document.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send the prompts and return the raw JSON text of the answer.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible APIs.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        fetch: &FetchConfig,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(fetch.timeout())
            .user_agent(fetch.user_agent.as_str())
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: AssistConfig::default().max_tokens,
        })
    }

    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when assisted matching is disabled or no key is set.
    pub fn from_config(assist: &AssistConfig, fetch: &FetchConfig) -> Result<Option<Self>> {
        if !assist.is_active() {
            return Ok(None);
        }
        let key = assist.api_key.clone().unwrap_or_default();
        let client = Self::new(&assist.base_url, key, &assist.model, fetch)?
            .with_max_tokens(assist.max_tokens);
        Ok(Some(client))
    }

    /// Override the completion token limit.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for ChatCompletionsClient {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "Chat completion request rejected");
            return Err(Error::Assist(format!("service returned HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Assist(format!("unreadable completion response: {e}")))?;

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis(),
            "Chat completion finished"
        );

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Assist("completion had no content".to_string()))
    }
}
