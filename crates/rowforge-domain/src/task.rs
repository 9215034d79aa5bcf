//! Task module - one run of a rule set over a dataset

use crate::error::DomainError;
use crate::rule::Rule;
use crate::status::TaskStatus;
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in seconds since Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Unique identifier for a task based on UUIDv7
///
/// UUIDv7 ids sort chronologically, which gives task listings a stable
/// recency order even for tasks created within the same second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u128);

impl TaskId {
    /// Generate a new UUIDv7-based TaskId
    ///
    /// # Examples
    ///
    /// ```
    /// use rowforge_domain::TaskId;
    ///
    /// let id = TaskId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a TaskId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a TaskId from its UUID string form
    ///
    /// # Examples
    ///
    /// ```
    /// use rowforge_domain::TaskId;
    ///
    /// let id = TaskId::new();
    /// let parsed = TaskId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid task id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl std::str::FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// A batch-transformation task
///
/// Field updates are made only by the runner driving the task; everyone else
/// reads snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Human-readable display name
    pub name: String,

    /// Dataset the task reads
    pub input_path: PathBuf,

    /// Where the final augmented table is written
    pub output_path: PathBuf,

    /// Column whose values identify rows (row ordinal when `None`)
    pub index_column: Option<String>,

    /// Rules applied to every batch, in order
    pub rules: Vec<Rule>,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Percentage of rows processed, 0-100
    pub progress: f64,

    /// Rows in the dataset
    pub total_rows: usize,

    /// Rows merged so far (always a batch boundary or the total)
    pub processed_rows: usize,

    /// Start timestamp (seconds since epoch)
    pub started_at: u64,

    /// End timestamp, set on a terminal transition
    pub ended_at: Option<u64>,

    /// Error message for failed tasks
    pub error: Option<String>,

    /// Concurrent rule executions per batch
    pub worker_count: usize,

    /// Rows between checkpoints
    pub checkpoint_interval: usize,

    /// Rows per batch, fixed for the lifetime of the task
    pub batch_size: usize,

    /// Durable checkpoint metadata record
    pub checkpoint_location: PathBuf,

    /// Durable working-table snapshot
    pub partial_result_location: PathBuf,
}

impl Task {
    /// Move to `next` if the lifecycle allows it
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record forward progress; counts never decrease
    pub fn record_progress(&mut self, processed_rows: usize) {
        let processed = processed_rows.min(self.total_rows);
        if processed < self.processed_rows {
            return;
        }
        self.processed_rows = processed;
        self.progress = progress_percent(self.processed_rows, self.total_rows);
    }

    /// Mark the task completed
    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition(TaskStatus::Completed)?;
        self.progress = 100.0;
        self.ended_at = Some(unix_now());
        Ok(())
    }

    /// Mark the task failed, keeping its progress
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), DomainError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(message.into());
        self.ended_at = Some(unix_now());
        Ok(())
    }

    /// Distinct target columns across all rules, in first-seen order
    pub fn target_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for rule in &self.rules {
            for column in &rule.target_columns {
                if !columns.contains(&column.as_str()) {
                    columns.push(column);
                }
            }
        }
        columns
    }

    /// Summary view for status queries and listings
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.id,
            name: self.name.clone(),
            status: self.status,
            progress: self.progress,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            started_at: self.started_at,
            ended_at: self.ended_at,
            error: self.error.clone(),
            in_memory: true,
        }
    }
}

/// Percentage of `processed` over `total`, 100 for an empty dataset
pub fn progress_percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let pct = processed as f64 * 100.0 / total as f64;
    (pct * 100.0).round() / 100.0
}

/// Summary of a task, in memory or recovered from a checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    /// Task identifier
    pub task_id: TaskId,
    /// Display name
    pub name: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Percentage processed
    pub progress: f64,
    /// Rows in the dataset
    pub total_rows: usize,
    /// Rows merged so far
    pub processed_rows: usize,
    /// Start timestamp
    pub started_at: u64,
    /// End timestamp
    pub ended_at: Option<u64>,
    /// Error message
    pub error: Option<String>,
    /// Whether the task is admitted in the current process
    pub in_memory: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(total_rows: usize) -> Task {
        Task {
            id: TaskId::new(),
            name: "sample".to_string(),
            input_path: PathBuf::from("in.csv"),
            output_path: PathBuf::from("out.csv"),
            index_column: None,
            rules: vec![
                Rule::new("text", vec!["a".into(), "b".into()], "x").unwrap(),
                Rule::new("text", vec!["b".into(), "c".into()], "y").unwrap(),
            ],
            status: TaskStatus::Pending,
            progress: 0.0,
            total_rows,
            processed_rows: 0,
            started_at: unix_now(),
            ended_at: None,
            error: None,
            worker_count: 2,
            checkpoint_interval: 10,
            batch_size: 10,
            checkpoint_location: PathBuf::from("meta.json"),
            partial_result_location: PathBuf::from("snapshot.json"),
        }
    }

    #[test]
    fn test_task_id_round_trip() {
        let id = TaskId::from_value(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string().parse::<TaskId>().unwrap(), id);
    }

    #[test]
    fn test_task_id_parse_error() {
        assert!(TaskId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_progress_is_monotone() {
        let mut task = sample_task(25);
        task.record_progress(10);
        task.record_progress(20);
        assert_eq!(task.processed_rows, 20);
        assert_eq!(task.progress, 80.0);

        task.record_progress(10);
        assert_eq!(task.processed_rows, 20);

        task.record_progress(40);
        assert_eq!(task.processed_rows, 25);
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn test_lifecycle() {
        let mut task = sample_task(5);
        assert!(task.complete().is_err());

        task.transition(TaskStatus::Processing).unwrap();
        task.fail("boom").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.ended_at.is_some());
        assert!(task.transition(TaskStatus::Processing).is_err());
    }

    #[test]
    fn test_target_columns_deduplicated() {
        let task = sample_task(1);
        assert_eq!(task.target_columns(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_dataset_progress() {
        assert_eq!(progress_percent(0, 0), 100.0);
        assert_eq!(progress_percent(1, 3), 33.33);
    }
}
