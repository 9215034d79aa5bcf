//! Chat Completions Provider Implementation
//!
//! Talks to any service exposing the OpenAI-compatible
//! `POST {endpoint}` chat completions contract.
//!
//! # Features
//!
//! - Async HTTP communication
//! - Bearer authentication when an API key is configured
//! - Retry with exponential backoff for transport errors, 429 and 5xx
//! - Per-request timeout
//!
//! # Examples
//!
//! ```no_run
//! use rowforge_llm::{ChatCompletionsProvider, ChatConfig};
//!
//! let config = ChatConfig {
//!     model: "deepseek-chat".to_string(),
//!     ..ChatConfig::default()
//! };
//! let provider = ChatCompletionsProvider::from_config(&config, None).unwrap();
//! ```

use crate::LlmError;
use rowforge_domain::TextGenerator;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default chat completions endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";

/// Default timeout for generation requests (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts per prompt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay before the first retry (milliseconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Longest error body kept in `LlmError::Http`
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for a chat completions service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Full URL of the chat completions route
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens (service default when absent)
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per prompt, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f32 {
    0.6
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Text generator backed by an OpenAI-compatible chat completions service
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of one attempt
enum Attempt {
    Done(Result<String, LlmError>),
    Retry(LlmError),
}

impl ChatCompletionsProvider {
    /// Create a provider with default settings
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rowforge_llm::ChatCompletionsProvider;
    ///
    /// let provider = ChatCompletionsProvider::new(
    ///     "http://localhost:11434/v1/chat/completions",
    ///     "llama3",
    /// ).unwrap();
    /// ```
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let config = ChatConfig {
            endpoint: endpoint.into(),
            model: model.into(),
            ..ChatConfig::default()
        };
        Self::from_config(&config, None)
    }

    /// Create a provider from configuration and an optional bearer token
    pub fn from_config(config: &ChatConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        if config.endpoint.trim().is_empty() {
            return Err(LlmError::Other("endpoint must not be empty".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(LlmError::Other("model must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.filter(|k| !k.is_empty()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Set the maximum number of attempts per prompt
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the delay before the first retry
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Model name sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a prompt, retrying transient failures
    ///
    /// # Errors
    ///
    /// - `Network` / `Timeout` when the service cannot be reached in time
    /// - `Http` for non-success statuses (4xx other than 429 fail immediately)
    /// - `InvalidResponse` when the body has no `choices[0].message.content`
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.attempt(&request).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(error) => error,
            };

            if attempts >= self.max_retries {
                return Err(error);
            }

            // Exponential backoff: d, 2d, 4d, ...
            let delay = self.retry_delay.saturating_mul(2u32.saturating_pow(attempts - 1));
            warn!(
                "Generation attempt {}/{} failed: {}; retrying in {:?}",
                attempts, self.max_retries, error, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> Attempt {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Retry(LlmError::Timeout),
            Err(e) => return Attempt::Retry(LlmError::Network(format!("Request failed: {}", e))),
        };

        let status = response.status();
        if !status.is_success() {
            let mut body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            truncate(&mut body, MAX_ERROR_BODY);
            let error = LlmError::Http {
                status: status.as_u16(),
                body,
            };
            return if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Attempt::Retry(error)
            } else {
                Attempt::Done(Err(error))
            };
        }

        let parsed = match response.json::<ChatResponse>().await {
            Ok(parsed) => parsed,
            Err(e) if e.is_timeout() => return Attempt::Retry(LlmError::Timeout),
            Err(e) => {
                return Attempt::Done(Err(LlmError::InvalidResponse(format!(
                    "Failed to parse response: {}",
                    e
                ))))
            }
        };

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);

        match content {
            Some(content) => {
                debug!("Received {} characters from {}", content.len(), self.model);
                Attempt::Done(Ok(content))
            }
            None => Attempt::Done(Err(LlmError::InvalidResponse(
                "response has no choices[0].message.content".to_string(),
            ))),
        }
    }
}

impl TextGenerator for ChatCompletionsProvider {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.complete(prompt).await
    }
}

fn truncate(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
