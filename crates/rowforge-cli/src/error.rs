//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task service error
    #[error("{0}")]
    Task(#[from] rowforge_tasks::TaskError),

    /// Text-generation client error
    #[error("LLM client error: {0}")]
    Llm(#[from] rowforge_llm::LlmError),

    /// Invalid rule definition
    #[error("Invalid rule: {0}")]
    Rule(#[from] rowforge_domain::DomainError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A followed task ended in failure
    #[error("Task {id} failed: {message}")]
    TaskFailed {
        /// Task ID
        id: String,
        /// Failure reason
        message: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
