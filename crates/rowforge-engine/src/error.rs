//! Error types for the engine

use thiserror::Error;

/// Errors that can occur while executing rules
///
/// All of these are recovered at the batch level: the affected rule's
/// target columns receive the sentinel for the batch and the failure is
/// recorded in the batch report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Text-generation call failed
    #[error("Rule execution failed: {0}")]
    RuleExecution(String),

    /// Text-generation call exceeded the request timeout
    #[error("Rule execution timed out")]
    Timeout,

    /// Reply did not contain a decodable list
    #[error("Response parse error: {0}")]
    ResponseParse(String),

    /// Source column not present in the working table
    #[error("Missing source column: {0}")]
    MissingSourceColumn(String),
}
