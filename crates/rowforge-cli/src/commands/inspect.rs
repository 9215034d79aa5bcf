//! Inspect command implementation.

use crate::cli::InspectArgs;
use crate::error::Result;
use crate::output::Formatter;
use rowforge_domain::TextGenerator;
use rowforge_tasks::TaskService;
use std::fmt::Display;

/// Execute the inspect command.
pub fn execute_inspect<G>(
    args: InspectArgs,
    service: &TaskService<G>,
    formatter: &Formatter,
) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let dataset = service.inspect_dataset(&args.file, args.index_column.as_deref())?;
    println!("{}", formatter.format_dataset(&dataset)?);
    Ok(())
}
