//! Domain invariant violations

use crate::status::TaskStatus;
use std::fmt;

/// Errors raised when a domain invariant would be broken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A rule definition is malformed
    InvalidRule(String),

    /// A rule references a column the dataset does not have
    UnknownSourceColumn {
        /// Rule identifier
        rule_id: String,
        /// Missing column
        column: String,
    },

    /// Table shape or identifiers are inconsistent
    InvalidTable(String),

    /// Batch size of zero
    InvalidBatchSize,

    /// Lifecycle transition not allowed by the state machine
    InvalidTransition {
        /// Current status
        from: TaskStatus,
        /// Requested status
        to: TaskStatus,
    },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::InvalidRule(msg) => write!(f, "Invalid rule: {}", msg),
            DomainError::UnknownSourceColumn { rule_id, column } => write!(
                f,
                "Rule {} references unknown source column '{}'",
                rule_id, column
            ),
            DomainError::InvalidTable(msg) => write!(f, "Invalid table: {}", msg),
            DomainError::InvalidBatchSize => write!(f, "Batch size must be greater than 0"),
            DomainError::InvalidTransition { from, to } => write!(
                f,
                "Invalid task transition: {} -> {}",
                from.as_str(),
                to.as_str()
            ),
        }
    }
}

impl std::error::Error for DomainError {}
