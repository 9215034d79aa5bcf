//! Error types for task management

use rowforge_domain::{DomainError, TaskId};
use rowforge_store::StoreError;
use thiserror::Error;

/// Errors that can occur while managing or running tasks
///
/// `InputRead` and `OutputWrite` are the only errors that fail a running
/// task; everything the engine raises per rule is absorbed into sentinels.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Dataset could not be read
    #[error("Input read error: {0}")]
    InputRead(String),

    /// Final output could not be written
    #[error("Output write error: {0}")]
    OutputWrite(String),

    /// Checkpoint does not match the task's input
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Request parameters rejected
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown task id
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain invariant violated
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}
