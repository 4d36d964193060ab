//! Text-completion seam.
//!
//! The generator only sees [`TextCompletion`]: message history in, one string
//! out. [`HttpCompletionClient`] talks to any OpenAI-compatible
//! `/chat/completions` endpoint; tests inject
//! [`crate::fakes::ScriptedCompletion`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompletionError;
use crate::message::ChatMessage;

/// Opaque text generation: message history to a single response string.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Completion endpoint configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Bearer API key (optional for local endpoints)
    pub api_key: Option<String>,
    /// Per-call timeout
    pub timeout: Duration,
    /// Honour `HTTP_PROXY` / `HTTPS_PROXY` from the environment
    pub use_system_proxy: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            base_url: std::env::var("NILSTASH_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("NILSTASH_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_key: std::env::var("NILSTASH_LLM_API_KEY").ok(),
            timeout: Duration::from_secs(60),
            use_system_proxy: true,
        }
    }
}

impl CompletionConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint and model
    pub fn new(base_url: &str, model: &str) -> Self {
        CompletionConfig {
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            use_system_proxy: true,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct HttpCompletionClient {
    config: CompletionConfig,
    http_client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("nilstash/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(HttpCompletionClient {
            http_client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[async_trait]
impl TextCompletion for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
        };
        let mut request = self.http_client.post(self.config.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "completion response");

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("no message content".to_string()))
    }
}
