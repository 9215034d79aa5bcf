//! Task service
//!
//! Entry point for the outer surfaces: imports datasets, admits tasks and
//! spawns their runners, and answers status, listing, restart, delete and
//! download requests against the registry and the checkpoint store.

use crate::config::{DataLayout, ServiceConfig, TaskLimits};
use crate::error::TaskError;
use crate::registry::{TaskHandle, TaskRegistry};
use crate::runner::TaskRunner;
use rowforge_domain::{unix_now, Rule, Table, TableCodec, Task, TaskId, TaskStatus, TaskSummary, TextGenerator};
use rowforge_engine::{EngineConfig, RuleExecutor};
use rowforge_store::{CheckpointStore, CsvCodec};
use serde::Serialize;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Rows included in a dataset preview
pub const SAMPLE_ROWS: usize = 5;

/// Description of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Import identifier, `None` for an inspected file
    pub import_id: Option<String>,
    /// Location of the dataset
    pub path: PathBuf,
    /// Number of data rows
    pub row_count: usize,
    /// Column names in order
    pub columns: Vec<String>,
    /// Row-id column, if the requested one exists
    pub index_column: Option<String>,
    /// First rows of the dataset
    pub sample_rows: Vec<Vec<String>>,
}

/// Parameters of a new task
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    /// Dataset to process
    pub input_path: PathBuf,
    /// Rules to apply, at least one
    pub rules: Vec<Rule>,
    /// Concurrent rule executions; defaults to the configured default
    pub worker_count: Option<usize>,
    /// Rows between checkpoints; defaults to the configured default
    pub checkpoint_interval: Option<usize>,
    /// Display name; derived from the input file name when absent
    pub name: Option<String>,
    /// Column used as the row id
    pub index_column: Option<String>,
}

/// Manages batch-transformation tasks for one data directory
pub struct TaskService<G> {
    layout: DataLayout,
    limits: TaskLimits,
    registry: TaskRegistry,
    store: Arc<CheckpointStore>,
    codec: CsvCodec,
    executor: RuleExecutor<G>,
}

impl<G> TaskService<G>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    /// Open a service over `config.data_dir`, creating its directories
    pub fn new(config: ServiceConfig, generator: G) -> Result<Self, TaskError> {
        Self::with_generator(config, Arc::new(generator))
    }

    /// Open a service sharing an existing generator
    pub fn with_generator(config: ServiceConfig, generator: Arc<G>) -> Result<Self, TaskError> {
        config.validate().map_err(TaskError::Config)?;

        let layout = DataLayout::new(&config.data_dir);
        layout.ensure().map_err(|e| TaskError::Store(e.into()))?;
        let store = Arc::new(CheckpointStore::new(layout.checkpoints_dir())?);
        info!("Task service ready at {}", layout.root().display());

        Ok(Self {
            registry: TaskRegistry::new(Arc::clone(&store)),
            executor: RuleExecutor::new(generator, config.engine),
            limits: config.limits,
            layout,
            store,
            codec: CsvCodec::new(),
        })
    }

    /// Directory layout
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Engine settings applied to new tasks
    pub fn engine_config(&self) -> &EngineConfig {
        self.executor.config()
    }

    /// Describe a dataset without importing it
    pub fn inspect_dataset(
        &self,
        path: &Path,
        index_column: Option<&str>,
    ) -> Result<DatasetInfo, TaskError> {
        let table = self.read_input(path, index_column)?;
        Ok(describe(&table, path, index_column, None))
    }

    /// Copy a dataset into the imports directory and describe it
    pub fn import_dataset(
        &self,
        source: &Path,
        index_column: Option<&str>,
    ) -> Result<DatasetInfo, TaskError> {
        let table = self.read_input(source, index_column)?;

        let import_id = uuid::Uuid::now_v7().to_string();
        let path = self.layout.imports_dir().join(format!("{}.csv", import_id));
        fs::copy(source, &path).map_err(|e| TaskError::InputRead(e.to_string()))?;
        info!(
            "Imported {} ({} rows) as {}",
            source.display(),
            table.len(),
            import_id
        );

        Ok(describe(&table, &path, index_column, Some(import_id)))
    }

    /// Admit a task and start its runner
    ///
    /// Must be called from within a Tokio runtime. Returns as soon as the
    /// task is admitted; progress is observed through [`Self::status`] or
    /// [`Self::subscribe`].
    pub fn start_task(&self, request: StartRequest) -> Result<TaskId, TaskError> {
        let worker_count = request
            .worker_count
            .unwrap_or(self.limits.default_worker_count);
        let checkpoint_interval = request
            .checkpoint_interval
            .unwrap_or(self.limits.default_checkpoint_interval);
        self.limits.check(worker_count, checkpoint_interval)?;

        if request.rules.is_empty() {
            return Err(TaskError::InvalidRequest(
                "at least one rule is required".to_string(),
            ));
        }
        let input = self.read_input(&request.input_path, request.index_column.as_deref())?;
        for rule in &request.rules {
            rule.validate()?;
            rule.check_schema(input.columns())?;
        }

        let id = TaskId::new();
        let name = request
            .name
            .unwrap_or_else(|| default_name(&request.input_path));
        let output_path = self
            .layout
            .exports_dir()
            .join(format!("processed_{}_{}.csv", id, unix_now()));
        let task = Task {
            id,
            name,
            input_path: request.input_path,
            output_path,
            index_column: request.index_column,
            rules: request.rules,
            status: TaskStatus::Pending,
            progress: 0.0,
            total_rows: input.len(),
            processed_rows: 0,
            started_at: unix_now(),
            ended_at: None,
            error: None,
            worker_count,
            checkpoint_interval,
            batch_size: self.executor.config().batch_size,
            checkpoint_location: self.store.metadata_path(&id),
            partial_result_location: self.store.snapshot_path(&id),
        };

        info!(
            "Task {} admitted: {} rows, {} rules",
            id,
            task.total_rows,
            task.rules.len()
        );
        let handle = self.registry.register(task);
        self.spawn(handle);
        Ok(id)
    }

    /// Status of a task, falling back to its checkpoint
    pub fn status(&self, id: &TaskId) -> Result<TaskSummary, TaskError> {
        self.registry.summary(id)
    }

    /// Every known task, most recently started first
    pub fn list(&self) -> Vec<TaskSummary> {
        self.registry.list()
    }

    /// Resume a task from its last checkpoint
    ///
    /// A task that is still pending or processing, or already completed,
    /// is left alone. A failed task, or one known only from its checkpoint,
    /// is re-admitted as pending and resumes at the first batch after its
    /// last snapshot.
    pub fn restart(&self, id: &TaskId) -> Result<TaskId, TaskError> {
        let Some(previous) = self.registry.find(id)? else {
            return Err(TaskError::NotFound(*id));
        };
        if previous.status == TaskStatus::Completed {
            info!("Task {} already completed, nothing to restart", id);
            return Ok(*id);
        }

        let task = Task {
            status: TaskStatus::Pending,
            started_at: unix_now(),
            ended_at: None,
            error: None,
            checkpoint_location: self.store.metadata_path(id),
            partial_result_location: self.store.snapshot_path(id),
            ..previous
        };

        match self.registry.admit_if_idle(task)? {
            Some(handle) => {
                info!("Task {} re-admitted", id);
                self.spawn(handle);
            }
            None => info!("Task {} is already running", id),
        }
        Ok(*id)
    }

    /// Delete a finished task and all of its artifacts
    pub fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        self.registry.remove(id)
    }

    /// Write the best available result of a task to the exports directory
    pub fn download_partial(&self, id: &TaskId) -> Result<PathBuf, TaskError> {
        let task = self.registry.find(id)?.ok_or(TaskError::NotFound(*id))?;
        Ok(self
            .store
            .export_partial(&task, &self.layout.exports_dir())?)
    }

    /// Final output of a completed task
    ///
    /// Returns `None` unless the task has completed and its output exists.
    pub fn download_result(&self, id: &TaskId) -> Result<Option<PathBuf>, TaskError> {
        let task = self.registry.find(id)?.ok_or(TaskError::NotFound(*id))?;
        if task.status == TaskStatus::Completed && task.output_path.exists() {
            Ok(Some(task.output_path))
        } else {
            Ok(None)
        }
    }

    /// Watch an admitted task
    pub fn subscribe(&self, id: &TaskId) -> Option<watch::Receiver<Task>> {
        self.registry.handle(id).map(|handle| handle.subscribe())
    }

    /// Wait until a task reaches a terminal status
    ///
    /// Tasks that are not admitted return their checkpointed status at once.
    pub async fn wait(&self, id: &TaskId) -> Result<TaskSummary, TaskError> {
        let Some(mut receiver) = self.subscribe(id) else {
            return self.status(id);
        };
        let task = receiver
            .wait_for(|task| task.status.is_terminal())
            .await
            .map_err(|_| TaskError::NotFound(*id))?;
        Ok(task.summary())
    }

    fn spawn(&self, handle: TaskHandle) {
        let runner = TaskRunner::new(
            handle,
            Arc::clone(&self.store),
            self.codec,
            self.executor.clone(),
        );
        tokio::spawn(runner.run());
    }

    fn read_input(&self, path: &Path, index_column: Option<&str>) -> Result<Table, TaskError> {
        self.codec
            .read_table(path, index_column)
            .map_err(|e| TaskError::InputRead(format!("{}: {}", path.display(), e)))
    }
}

fn describe(
    table: &Table,
    path: &Path,
    index_column: Option<&str>,
    import_id: Option<String>,
) -> DatasetInfo {
    let index_column = index_column.and_then(|column| {
        if table.column_index(column).is_some() {
            Some(column.to_string())
        } else {
            warn!("Index column '{}' not found, using row positions", column);
            None
        }
    });

    DatasetInfo {
        import_id,
        path: path.to_path_buf(),
        row_count: table.len(),
        columns: table.columns().to_vec(),
        index_column,
        sample_rows: table
            .rows()
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| row.values.clone())
            .collect(),
    }
}

fn default_name(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "task".to_string())
}
