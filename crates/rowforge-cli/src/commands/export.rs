//! Export command implementation.

use crate::cli::ExportArgs;
use crate::commands::parse_task_id;
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use rowforge_domain::TextGenerator;
use rowforge_tasks::TaskService;
use std::fmt::Display;
use std::fs;

/// Execute the export command.
pub fn execute_export<G>(
    args: ExportArgs,
    service: &TaskService<G>,
    formatter: &Formatter,
) -> Result<()>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    let id = parse_task_id(&args.task_id)?;

    let exported = if args.partial {
        service.download_partial(&id)?
    } else {
        service.download_result(&id)?.ok_or_else(|| {
            CliError::InvalidInput(format!(
                "task {} has not completed; use --partial for its last checkpoint",
                id
            ))
        })?
    };

    let path = match args.output {
        Some(destination) => {
            fs::copy(&exported, &destination)?;
            destination
        }
        None => exported,
    };

    match formatter.format() {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "task_id": id.to_string(),
                "partial": args.partial,
                "path": path,
            }))?
        ),
        OutputFormat::Table => println!(
            "{}",
            formatter.success(&format!("Exported to {}", path.display()))
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowforge_domain::Rule;
    use rowforge_llm::MockProvider;
    use rowforge_tasks::{ServiceConfig, StartRequest};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_requires_partial_until_completed() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("people.csv");
        fs::write(&input, "id,text\np0,a\np1,b\n").unwrap();
        let service =
            TaskService::new(ServiceConfig::new(dir.path().join("data")), MockProvider::new("[]"))
                .unwrap();
        let formatter = Formatter::new(OutputFormat::Table, false);

        let id = service
            .start_task(StartRequest {
                input_path: input,
                rules: vec![Rule::new("text", vec!["x".into()], "x").unwrap()],
                index_column: Some("id".to_string()),
                ..StartRequest::default()
            })
            .unwrap();

        // Not yet polled: the task is still pending
        let final_export = ExportArgs {
            task_id: id.to_string(),
            partial: false,
            output: None,
        };
        assert!(matches!(
            execute_export(final_export, &service, &formatter),
            Err(CliError::InvalidInput(_))
        ));

        let copy = dir.path().join("partial.csv");
        let partial_export = ExportArgs {
            task_id: id.to_string(),
            partial: true,
            output: Some(copy.clone()),
        };
        execute_export(partial_export, &service, &formatter).unwrap();
        let content = fs::read_to_string(&copy).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("id,text,x"));

        service.wait(&id).await.unwrap();
        let final_export = ExportArgs {
            task_id: id.to_string(),
            partial: false,
            output: None,
        };
        execute_export(final_export, &service, &formatter).unwrap();
    }
}
