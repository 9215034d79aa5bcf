//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rowforge CLI - apply extraction rules to tabular datasets with an LLM.
#[derive(Debug, Parser)]
#[command(name = "rowforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ROWFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show columns, row count and sample rows of a dataset
    Inspect(InspectArgs),

    /// Import a dataset, start a task and follow it
    Run(RunArgs),

    /// Resume a failed or interrupted task from its last checkpoint
    Resume(TaskArgs),

    /// List known tasks, newest first
    List,

    /// Show the status of a task
    Status(TaskArgs),

    /// Delete a finished task and its files
    Delete(DeleteArgs),

    /// Export the result of a task
    Export(ExportArgs),
}

/// Arguments for the inspect command.
#[derive(Debug, Parser)]
pub struct InspectArgs {
    /// Dataset file (CSV)
    pub file: PathBuf,

    /// Column holding unique row identifiers
    #[arg(short, long)]
    pub index_column: Option<String>,
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Dataset file (CSV)
    pub file: PathBuf,

    /// TOML file with `[[rule]]` tables
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Concurrent rule executions per batch (1-8)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Rows between checkpoints (1-10000)
    #[arg(long)]
    pub checkpoint_every: Option<usize>,

    /// Task display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Column holding unique row identifiers
    #[arg(short, long)]
    pub index_column: Option<String>,
}

/// Arguments naming a task.
#[derive(Debug, Parser)]
pub struct TaskArgs {
    /// Task ID
    pub task_id: String,
}

/// Arguments for the delete command.
#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Task ID
    pub task_id: String,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the export command.
#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Task ID
    pub task_id: String,

    /// Export the last checkpoint of an unfinished task
    #[arg(short, long)]
    pub partial: bool,

    /// Copy the export to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from([
            "rowforge",
            "run",
            "people.csv",
            "--rules",
            "rules.toml",
            "--workers",
            "4",
            "--checkpoint-every",
            "100",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.file, PathBuf::from("people.csv"));
                assert_eq!(args.workers, Some(4));
                assert_eq!(args.checkpoint_every, Some(100));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_export_partial() {
        let cli = Cli::parse_from(["rowforge", "--format", "json", "export", "abc", "--partial"]);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.task_id, "abc");
                assert!(args.partial);
                assert!(args.output.is_none());
            }
            _ => panic!("Expected Export command"),
        }
    }

    #[test]
    fn test_missing_rules_is_an_error() {
        assert!(Cli::try_parse_from(["rowforge", "run", "people.csv"]).is_err());
    }
}
