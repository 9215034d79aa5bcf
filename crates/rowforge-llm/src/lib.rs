//! Rowforge LLM Provider Layer
//!
//! Implementations of the `TextGenerator` trait from `rowforge-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `ChatCompletionsProvider`: OpenAI-compatible chat completions endpoint
//!
//! # Examples
//!
//! ```
//! use rowforge_llm::MockProvider;
//! use rowforge_domain::TextGenerator;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.generate("test prompt").await.unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! # }
//! ```

#![warn(missing_docs)]

pub mod chat;

use rowforge_domain::TextGenerator;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub use chat::{ChatCompletionsProvider, ChatConfig};

/// Errors that can occur during text-generation calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request did not finish in time
    #[error("Request timed out")]
    Timeout,

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

type Responder = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// Mock text generator for deterministic testing
///
/// Replies are chosen in this order: the first scripted entry whose needle
/// occurs in the prompt, then the responder closure, then the default reply.
/// No network calls are made.
///
/// # Examples
///
/// ```
/// use rowforge_llm::MockProvider;
/// use rowforge_domain::TextGenerator;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = MockProvider::new(r#"[{"a": "1"}]"#);
/// provider.add_response("summarise", "[]");
/// provider.add_error("refuse");
///
/// assert_eq!(provider.generate("please summarise").await.unwrap(), "[]");
/// assert!(provider.generate("refuse this").await.is_err());
/// assert_eq!(provider.call_count(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct MockProvider {
    default_response: String,
    scripted: Arc<Mutex<Vec<(String, Result<String, LlmError>)>>>,
    responder: Option<Arc<Responder>>,
    prompts: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            scripted: Arc::new(Mutex::new(Vec::new())),
            responder: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Create a MockProvider that computes each reply from the prompt
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::default()
        }
    }

    /// Delay every reply (for timeout and concurrency tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reply with `response` whenever the prompt contains `needle`
    pub fn add_response(&self, needle: impl Into<String>, response: impl Into<String>) {
        lock(&self.scripted).push((needle.into(), Ok(response.into())));
    }

    /// Fail with an HTTP 500 whenever the prompt contains `needle`
    pub fn add_error(&self, needle: impl Into<String>) {
        lock(&self.scripted).push((
            needle.into(),
            Err(LlmError::Http {
                status: 500,
                body: "Mock error".to_string(),
            }),
        ));
    }

    /// Number of generate calls made so far
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Forget recorded prompts
    pub fn reset_call_count(&self) {
        lock(&self.prompts).clear();
    }

    fn reply_for(&self, prompt: &str) -> Result<String, LlmError> {
        lock(&self.prompts).push(prompt.to_string());

        let scripted = lock(&self.scripted);
        if let Some((_, reply)) = scripted.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            return reply.clone();
        }
        drop(scripted);

        match &self.responder {
            Some(responder) => responder(prompt),
            None => Ok(self.default_response.clone()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("default_response", &self.default_response)
            .field("has_responder", &self.responder.is_some())
            .field("delay", &self.delay)
            .finish()
    }
}

impl TextGenerator for MockProvider {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        let reply = self.reply_for(prompt);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
