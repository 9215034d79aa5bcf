//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use chrono::{DateTime, Utc};
use colored::*;
use rowforge_domain::{TaskStatus, TaskSummary};
use rowforge_tasks::DatasetInfo;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a task listing.
    pub fn format_tasks(&self, tasks: &[TaskSummary]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<serde_json::Value> = tasks.iter().map(task_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Table => Ok(self.format_tasks_table(tasks)),
        }
    }

    /// Format a single task.
    pub fn format_task(&self, task: &TaskSummary) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&task_json(task))?),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                builder.push_record(["ID", &task.task_id.to_string()]);
                builder.push_record(["Name", &task.name]);
                builder.push_record(["Status", &self.status(task.status)]);
                builder.push_record([
                    "Progress",
                    &format!(
                        "{}/{} rows ({:.2}%)",
                        task.processed_rows, task.total_rows, task.progress
                    ),
                ]);
                builder.push_record(["Started", &timestamp(task.started_at)]);
                builder.push_record([
                    "Ended",
                    &task.ended_at.map(timestamp).unwrap_or_else(|| "-".to_string()),
                ]);
                builder.push_record(["Error", task.error.as_deref().unwrap_or("-")]);
                builder.push_record([
                    "Source",
                    if task.in_memory { "live" } else { "checkpoint" },
                ]);

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format dataset information.
    pub fn format_dataset(&self, dataset: &DatasetInfo) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(dataset)?),
            OutputFormat::Table => {
                let mut out = format!(
                    "{} rows, {} columns, row id: {}\n",
                    dataset.row_count,
                    dataset.columns.len(),
                    dataset.index_column.as_deref().unwrap_or("row position")
                );
                if let Some(id) = &dataset.import_id {
                    out.push_str(&format!("Import ID: {}\n", id));
                }

                let mut builder = Builder::default();
                builder.push_record(dataset.columns.iter().map(String::as_str));
                for row in &dataset.sample_rows {
                    builder.push_record(row.iter().map(|v| truncate(v, 40)));
                }
                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                out.push_str(&table.to_string());
                Ok(out)
            }
        }
    }

    /// One-line progress report.
    pub fn progress(&self, task: &TaskSummary) -> String {
        format!(
            "{} {}/{} rows ({:.2}%)",
            self.status(task.status),
            task.processed_rows,
            task.total_rows,
            task.progress
        )
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn format_tasks_table(&self, tasks: &[TaskSummary]) -> String {
        if tasks.is_empty() {
            return self.colorize("No tasks found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Name", "Status", "Progress", "Rows", "Started", "Source"]);
        for task in tasks {
            builder.push_record([
                task.task_id.to_string(),
                truncate(&task.name, 30),
                self.status(task.status),
                format!("{:.2}%", task.progress),
                format!("{}/{}", task.processed_rows, task.total_rows),
                timestamp(task.started_at),
                if task.in_memory { "live" } else { "checkpoint" }.to_string(),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    fn status(&self, status: TaskStatus) -> String {
        let color = match status {
            TaskStatus::Pending => "cyan",
            TaskStatus::Processing => "blue",
            TaskStatus::Completed => "green",
            TaskStatus::Failed => "red",
        };
        self.colorize(status.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn task_json(task: &TaskSummary) -> serde_json::Value {
    serde_json::json!({
        "task_id": task.task_id.to_string(),
        "name": task.name,
        "status": task.status.as_str(),
        "progress": task.progress,
        "total_rows": task.total_rows,
        "processed_rows": task.processed_rows,
        "started_at": task.started_at,
        "ended_at": task.ended_at,
        "error": task.error,
        "in_memory": task.in_memory,
    })
}

/// Seconds since epoch as `YYYY-MM-DD HH:MM:SS` (UTC)
fn timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_domain::TaskId;
    use std::path::PathBuf;

    fn summary(status: TaskStatus) -> TaskSummary {
        TaskSummary {
            task_id: TaskId::new(),
            name: "people".to_string(),
            status,
            progress: 80.0,
            total_rows: 25,
            processed_rows: 20,
            started_at: 1_700_000_000,
            ended_at: None,
            error: None,
            in_memory: false,
        }
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter
            .format_tasks(&[summary(TaskStatus::Failed)])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["status"], "failed");
        assert_eq!(value[0]["processed_rows"], 20);
        assert_eq!(value[0]["in_memory"], false);
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter
            .format_tasks(&[summary(TaskStatus::Processing)])
            .unwrap();
        assert!(output.contains("Status"));
        assert!(output.contains("processing"));
        assert!(output.contains("20/25"));
        assert!(output.contains("checkpoint"));
    }

    #[test]
    fn test_empty_tasks() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_tasks(&[]).unwrap();
        assert!(output.contains("No tasks found"));
    }

    #[test]
    fn test_dataset_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let dataset = DatasetInfo {
            import_id: None,
            path: PathBuf::from("people.csv"),
            row_count: 2,
            columns: vec!["id".to_string(), "text".to_string()],
            index_column: Some("id".to_string()),
            sample_rows: vec![vec!["p0".to_string(), "hello".to_string()]],
        };
        let output = formatter.format_dataset(&dataset).unwrap();
        assert!(output.starts_with("2 rows, 2 columns, row id: id"));
        assert!(output.contains("hello"));
    }

    #[test]
    fn test_progress_line() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(
            formatter.progress(&summary(TaskStatus::Processing)),
            "processing 20/25 rows (80.00%)"
        );
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(timestamp(1_700_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
