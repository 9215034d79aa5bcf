//! Rowforge CLI - apply extraction rules to tabular datasets with an LLM.

use clap::Parser;
use rowforge_cli::commands;
use rowforge_cli::{Cli, CliError, Command, Config, Formatter};
use rowforge_llm::ChatCompletionsProvider;
use rowforge_tasks::TaskService;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> rowforge_cli::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load config from --config or the default location
    let path = match cli.config {
        Some(path) => path,
        None => Config::path()?,
    };
    let config = Config::load(&path)?;

    // Log to stderr; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| CliError::Config(format!("Invalid log_level: {}", e)))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    debug!(
        "Configuration {} (data dir {})",
        path.display(),
        config.data_dir.display()
    );

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    let provider = ChatCompletionsProvider::from_config(&config.llm.chat, config.api_key())?;
    let service = TaskService::new(config.service_config(), provider)?;

    match cli.command {
        Command::Inspect(args) => commands::execute_inspect(args, &service, &formatter)?,
        Command::Run(args) => commands::execute_run(args, &service, &formatter).await?,
        Command::Resume(args) => commands::execute_resume(args, &service, &formatter).await?,
        Command::List => commands::execute_list(&service, &formatter)?,
        Command::Status(args) => commands::execute_status(args, &service, &formatter)?,
        Command::Delete(args) => commands::execute_delete(args, &service, &formatter)?,
        Command::Export(args) => commands::execute_export(args, &service, &formatter)?,
    }

    Ok(())
}
