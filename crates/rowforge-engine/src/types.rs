//! Batch input and output types

use rowforge_domain::{RowId, RuleId};
use std::ops::Range;
use std::time::Duration;

/// Read-only snapshot of one row handed to a rule execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    /// Row identifier
    pub id: RowId,

    /// Value of the rule's source column
    pub source: String,
}

/// Values produced by one rule for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    /// Row the values belong to
    pub row_id: RowId,

    /// One value per target column of the rule, in rule order
    pub values: Vec<String>,
}

/// A rule execution that failed for a whole batch
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    /// Failed rule
    pub rule_id: RuleId,

    /// Error description
    pub message: String,
}

/// Outcome of one completed batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Zero-based batch index
    pub index: usize,

    /// Rows covered by the batch
    pub rows: Range<usize>,

    /// Cumulative rows processed once this batch is merged
    pub processed_rows: usize,

    /// Rows in the batch with at least one non-empty target value
    pub succeeded_rows: usize,

    /// Rules that failed for this batch
    pub failures: Vec<RuleFailure>,

    /// Wall-clock time spent on the batch
    pub elapsed: Duration,
}

impl BatchReport {
    /// Rows covered by the batch
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
