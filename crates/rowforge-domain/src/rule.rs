//! Rule module - user-defined extraction rules

use crate::error::DomainError;
use std::collections::HashSet;
use std::fmt;

/// Identifier of a rule
///
/// User-supplied ids are kept verbatim; generated ids are UUIDv7 strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(String);

impl RuleId {
    /// Generate a fresh UUIDv7-based rule id
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RuleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An extraction rule
///
/// Maps one source column to one or more target columns through an
/// instruction sent to the text-generation service.
///
/// # Examples
///
/// ```
/// use rowforge_domain::Rule;
///
/// let rule = Rule::new(
///     "notes",
///     vec!["diagnosis".to_string(), "medication".to_string()],
///     "Extract the diagnosis and prescribed medication",
/// ).unwrap();
/// assert_eq!(rule.target_columns.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Unique identifier
    pub id: RuleId,

    /// Column whose value is sent to the service
    pub source_column: String,

    /// Ordered, distinct, non-empty list of output columns
    pub target_columns: Vec<String>,

    /// Natural-language extraction instruction
    pub instruction: String,
}

impl Rule {
    /// Create a rule with a generated id
    pub fn new(
        source_column: impl Into<String>,
        target_columns: Vec<String>,
        instruction: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Self::with_id(RuleId::generate(), source_column, target_columns, instruction)
    }

    /// Create a rule with an explicit id
    pub fn with_id(
        id: RuleId,
        source_column: impl Into<String>,
        target_columns: Vec<String>,
        instruction: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let rule = Self {
            id,
            source_column: source_column.into(),
            target_columns,
            instruction: instruction.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check the rule's own invariants
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.source_column.trim().is_empty() {
            return Err(DomainError::InvalidRule(format!(
                "rule {} has an empty source column",
                self.id
            )));
        }
        if self.target_columns.is_empty() {
            return Err(DomainError::InvalidRule(format!(
                "rule {} has no target columns",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for column in &self.target_columns {
            if column.trim().is_empty() {
                return Err(DomainError::InvalidRule(format!(
                    "rule {} has an empty target column name",
                    self.id
                )));
            }
            if !seen.insert(column.as_str()) {
                return Err(DomainError::InvalidRule(format!(
                    "rule {} lists target column '{}' twice",
                    self.id, column
                )));
            }
        }
        Ok(())
    }

    /// Check that the source column exists in a dataset schema
    pub fn check_schema(&self, columns: &[String]) -> Result<(), DomainError> {
        if columns.iter().any(|c| c == &self.source_column) {
            Ok(())
        } else {
            Err(DomainError::UnknownSourceColumn {
                rule_id: self.id.to_string(),
                column: self.source_column.clone(),
            })
        }
    }
}
