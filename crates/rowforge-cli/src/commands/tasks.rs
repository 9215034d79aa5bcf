//! List, status and delete command implementations.

use crate::cli::{DeleteArgs, TaskArgs};
use crate::commands::parse_task_id;
use crate::error::Result;
use crate::output::Formatter;
use rowforge_domain::TextGenerator;
use rowforge_tasks::TaskService;
use std::fmt::Display;
use std::io::{self, Write};

/// Execute the list command.
pub fn execute_list<G>(service: &TaskService<G>, formatter: &Formatter) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    println!("{}", formatter.format_tasks(&service.list())?);
    Ok(())
}

/// Execute the status command.
pub fn execute_status<G>(
    args: TaskArgs,
    service: &TaskService<G>,
    formatter: &Formatter,
) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let id = parse_task_id(&args.task_id)?;
    println!("{}", formatter.format_task(&service.status(&id)?)?);
    Ok(())
}

/// Execute the delete command.
pub fn execute_delete<G>(
    args: DeleteArgs,
    service: &TaskService<G>,
    formatter: &Formatter,
) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let id = parse_task_id(&args.task_id)?;
    let summary = service.status(&id)?;

    // Confirm deletion unless --yes is specified
    if !args.yes {
        println!(
            "About to delete task {} ({}, {}) with its checkpoint and output.",
            id,
            summary.name,
            summary.status.as_str()
        );
        print!("Continue? [y/N] ");
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;

        if !response.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.info("Operation cancelled"));
            return Ok(());
        }
    }

    service.delete(&id)?;
    println!("{}", formatter.success(&format!("Deleted task {}", id)));
    Ok(())
}
