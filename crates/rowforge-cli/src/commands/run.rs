//! Run and resume command implementations.

use crate::cli::{RunArgs, TaskArgs};
use crate::commands::parse_task_id;
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::rules::load_rules;
use rowforge_domain::{TaskId, TaskStatus, TaskSummary, TextGenerator};
use rowforge_tasks::{StartRequest, TaskService};
use std::fmt::Display;

/// Execute the run command: import, start and follow a task.
pub async fn execute_run<G>(
    args: RunArgs,
    service: &TaskService<G>,
    formatter: &Formatter,
) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let rules = load_rules(&args.rules)?;
    let dataset = service.import_dataset(&args.file, args.index_column.as_deref())?;
    let name = args.name.or_else(|| {
        args.file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
    });

    let id = service.start_task(StartRequest {
        input_path: dataset.path,
        rules,
        worker_count: args.workers,
        checkpoint_interval: args.checkpoint_every,
        name,
        index_column: dataset.index_column,
    })?;
    eprintln!(
        "{}",
        formatter.info(&format!("Task {} started on {} rows", id, dataset.row_count))
    );

    report(service, &id, formatter).await
}

/// Execute the resume command.
pub async fn execute_resume<G>(
    args: TaskArgs,
    service: &TaskService<G>,
    formatter: &Formatter,
) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let id = parse_task_id(&args.task_id)?;
    let before = service.status(&id)?;
    service.restart(&id)?;
    eprintln!(
        "{}",
        formatter.info(&format!(
            "Resuming task {} from {}/{} rows",
            id, before.processed_rows, before.total_rows
        ))
    );

    report(service, &id, formatter).await
}

/// Print progress until the task is terminal or Ctrl+C is pressed.
///
/// Returns `None` when following was interrupted. The task keeps its last
/// checkpoint and can be resumed later.
pub async fn follow<G>(
    service: &TaskService<G>,
    id: &TaskId,
    formatter: &Formatter,
) -> Result<Option<TaskSummary>>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let Some(mut updates) = service.subscribe(id) else {
        return Ok(Some(service.status(id)?));
    };

    let mut last_processed = None;
    loop {
        let summary = updates.borrow_and_update().summary();
        if summary.status.is_terminal() {
            return Ok(Some(summary));
        }
        if formatter.format() == OutputFormat::Table && last_processed != Some(summary.processed_rows) {
            eprintln!("{}", formatter.progress(&summary));
            last_processed = Some(summary.processed_rows);
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(Some(service.status(id)?));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!(
                    "{}",
                    formatter.warning(&format!(
                        "Stopped following task {}; run `rowforge resume {}` to continue",
                        id, id
                    ))
                );
                return Ok(None);
            }
        }
    }
}

async fn report<G>(service: &TaskService<G>, id: &TaskId, formatter: &Formatter) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let Some(summary) = follow(service, id, formatter).await? else {
        return Ok(());
    };
    println!("{}", formatter.format_task(&summary)?);

    match summary.status {
        TaskStatus::Completed => {
            if let Some(path) = service.download_result(id)? {
                eprintln!(
                    "{}",
                    formatter.success(&format!("Output written to {}", path.display()))
                );
            }
            Ok(())
        }
        TaskStatus::Failed => Err(CliError::TaskFailed {
            id: id.to_string(),
            message: summary.error.unwrap_or_default(),
        }),
        _ => Ok(()),
    }
}
