//! On-disk checkpoint records
//!
//! Two self-describing JSON documents per task:
//!
//! - `CheckpointMeta`: task configuration, rule list, status and counts
//! - `SnapshotRecord`: the working table as of the last batch boundary,
//!   with every row keyed by its row id
//!
//! Both carry `format_version`. Readers reject versions newer than
//! [`FORMAT_VERSION`] instead of guessing at their layout.

use crate::StoreError;
use rowforge_domain::{Row, RowId, Rule, RuleId, Table, Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current record layout version
pub const FORMAT_VERSION: u32 = 1;

/// Task metadata as persisted next to the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Layout version
    pub format_version: u32,
    /// Task id (UUID string)
    pub task_id: String,
    /// Display name
    pub name: String,
    /// Dataset location
    pub input_path: PathBuf,
    /// Final output location
    pub output_path: PathBuf,
    /// Row-id column, if any
    #[serde(default)]
    pub index_column: Option<String>,
    /// Lifecycle status (`pending`, `processing`, `completed`, `failed`)
    pub status: String,
    /// Percentage processed
    pub progress: f64,
    /// Rows in the dataset
    pub total_rows: usize,
    /// Rows merged as of this record
    pub processed_rows: usize,
    /// Concurrent rule executions per batch
    pub worker_count: usize,
    /// Rows between checkpoints
    pub checkpoint_interval: usize,
    /// Rows per batch
    pub batch_size: usize,
    /// Rule definitions, in execution order
    pub rules: Vec<RuleRecord>,
    /// Start timestamp (seconds since epoch)
    pub started_at: u64,
    /// End timestamp
    #[serde(default)]
    pub ended_at: Option<u64>,
    /// Last error message
    #[serde(default)]
    pub error: Option<String>,
    /// When this record was written
    pub updated_at: u64,
}

/// Persisted rule definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Rule id
    pub rule_id: String,
    /// Source column
    pub source_column: String,
    /// Target columns
    pub target_columns: Vec<String>,
    /// Instruction text
    pub prompt: String,
}

/// Working-table snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Layout version
    pub format_version: u32,
    /// Owning task id
    pub task_id: String,
    /// Rows merged when the snapshot was taken (a batch boundary)
    pub processed_rows: usize,
    /// Column names, input columns first
    pub columns: Vec<String>,
    /// Rows in dataset order
    pub rows: Vec<SnapshotRow>,
    /// When the snapshot was written
    pub saved_at: u64,
}

/// One snapshot row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Row identifier
    pub row_id: String,
    /// Values aligned with `SnapshotRecord::columns`
    pub values: Vec<String>,
}

#[derive(Deserialize)]
struct VersionHeader {
    format_version: u32,
}

/// Decode a versioned record, rejecting layouts newer than this build
pub(crate) fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    let header: VersionHeader = serde_json::from_slice(bytes)?;
    if header.format_version > FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: header.format_version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}

impl From<&Rule> for RuleRecord {
    fn from(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id.to_string(),
            source_column: rule.source_column.clone(),
            target_columns: rule.target_columns.clone(),
            prompt: rule.instruction.clone(),
        }
    }
}

impl RuleRecord {
    /// Rebuild the domain rule, re-checking its invariants
    pub fn into_rule(self) -> Result<Rule, StoreError> {
        Ok(Rule::with_id(
            RuleId::from(self.rule_id),
            self.source_column,
            self.target_columns,
            self.prompt,
        )?)
    }
}

impl CheckpointMeta {
    /// Capture a task's durable fields
    pub fn from_task(task: &Task, updated_at: u64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            task_id: task.id.to_string(),
            name: task.name.clone(),
            input_path: task.input_path.clone(),
            output_path: task.output_path.clone(),
            index_column: task.index_column.clone(),
            status: task.status.as_str().to_string(),
            progress: task.progress,
            total_rows: task.total_rows,
            processed_rows: task.processed_rows,
            worker_count: task.worker_count,
            checkpoint_interval: task.checkpoint_interval,
            batch_size: task.batch_size,
            rules: task.rules.iter().map(RuleRecord::from).collect(),
            started_at: task.started_at,
            ended_at: task.ended_at,
            error: task.error.clone(),
            updated_at,
        }
    }

    /// Rebuild the task this record describes
    pub fn into_task(
        self,
        checkpoint_location: PathBuf,
        partial_result_location: PathBuf,
    ) -> Result<Task, StoreError> {
        let id = TaskId::from_string(&self.task_id).map_err(StoreError::InvalidData)?;
        let status = TaskStatus::parse(&self.status).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown task status '{}'", self.status))
        })?;
        let rules = self
            .rules
            .into_iter()
            .map(RuleRecord::into_rule)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Task {
            id,
            name: self.name,
            input_path: self.input_path,
            output_path: self.output_path,
            index_column: self.index_column,
            rules,
            status,
            progress: self.progress,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows.min(self.total_rows),
            started_at: self.started_at,
            ended_at: self.ended_at,
            error: self.error,
            worker_count: self.worker_count,
            checkpoint_interval: self.checkpoint_interval,
            batch_size: self.batch_size,
            checkpoint_location,
            partial_result_location,
        })
    }
}

impl SnapshotRecord {
    /// Capture a working table
    pub fn from_table(task_id: TaskId, processed_rows: usize, table: &Table, saved_at: u64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            task_id: task_id.to_string(),
            processed_rows,
            columns: table.columns().to_vec(),
            rows: table
                .rows()
                .iter()
                .map(|row| SnapshotRow {
                    row_id: row.id.to_string(),
                    values: row.values.clone(),
                })
                .collect(),
            saved_at,
        }
    }

    /// Rebuild the working table, checking widths and id uniqueness
    pub fn into_table(self) -> Result<Table, StoreError> {
        let rows = self
            .rows
            .into_iter()
            .map(|row| Row {
                id: RowId::from(row.row_id),
                values: row.values,
            })
            .collect();
        Ok(Table::from_rows(self.columns, rows)?)
    }
}
