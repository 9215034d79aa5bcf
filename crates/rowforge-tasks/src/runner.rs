//! Task runner
//!
//! Drives one task from `pending` to a terminal status:
//!
//! 1. load the input (or the last snapshot when resuming)
//! 2. run the remaining batches through the scheduler
//! 3. checkpoint every time the processed count crosses an interval
//! 4. write the final output and the final checkpoint
//!
//! The runner owns the task while it runs and publishes a copy after every
//! change. Only input and output failures are fatal; rule failures are
//! absorbed by the engine.

use crate::error::TaskError;
use crate::registry::TaskHandle;
use rowforge_domain::{BatchPlan, Table, TableCodec, Task, TaskStatus, TextGenerator};
use rowforge_engine::{BatchScheduler, RuleExecutor};
use rowforge_store::{CheckpointStore, CsvCodec};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

pub(crate) struct TaskRunner<G> {
    task: Task,
    handle: TaskHandle,
    store: Arc<CheckpointStore>,
    codec: CsvCodec,
    executor: RuleExecutor<G>,
    table: Option<Table>,
}

impl<G> TaskRunner<G>
where
    G: TextGenerator + Send + Sync + 'static,
    G::Error: Display,
{
    pub(crate) fn new(
        handle: TaskHandle,
        store: Arc<CheckpointStore>,
        codec: CsvCodec,
        executor: RuleExecutor<G>,
    ) -> Self {
        let task = handle.borrow().clone();
        Self {
            task,
            handle,
            store,
            codec,
            executor,
            table: None,
        }
    }

    /// Run the task to a terminal status
    pub(crate) async fn run(mut self) {
        let span = info_span!("task", task_id = %self.task.id);
        async move {
            let started = Instant::now();
            match self.drive().await {
                Ok(()) => info!(
                    "Task completed: {} rows in {:.2?}",
                    self.task.processed_rows,
                    started.elapsed()
                ),
                Err(e) => {
                    error!("Task failed: {}", e);
                    self.abort(e.to_string());
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self) -> Result<(), TaskError> {
        self.task.transition(TaskStatus::Processing)?;
        self.publish();
        info!(
            "Task started: {} rules, {} workers, batch size {}, checkpoint every {} rows",
            self.task.rules.len(),
            self.task.worker_count,
            self.task.batch_size,
            self.task.checkpoint_interval
        );
        if let Err(e) = self.store.save_metadata(&self.task) {
            warn!("Could not record task start: {}", e);
        }

        let input = self
            .codec
            .read_table(&self.task.input_path, self.task.index_column.as_deref())
            .map_err(|e| TaskError::InputRead(e.to_string()))?;
        let (table, processed) = self.working_table(input)?;

        let plan = BatchPlan::new(table.len(), self.task.batch_size)?;
        let processed = plan.aligned(processed);
        let start_index = plan.resume_index(processed);
        self.task.total_rows = table.len();
        self.task.processed_rows = processed;
        self.task.progress = rowforge_domain::progress_percent(processed, table.len());
        self.table = Some(table);
        self.publish();

        if processed > 0 {
            info!(
                "Resuming at batch {}/{} ({} rows already processed)",
                start_index + 1,
                plan.batch_count(),
                processed
            );
        }

        let scheduler = BatchScheduler::new(self.executor.clone(), self.task.worker_count);
        let rules = self.task.rules.clone();
        let interval = self.task.checkpoint_interval.max(1);
        let total = plan.total_rows();
        let mut last_checkpoint = processed;
        let mut run = scheduler.run(&rules, plan, start_index);

        loop {
            let Some(table) = self.table.as_mut() else {
                break;
            };
            let Some(report) = run.next(table).await else {
                break;
            };

            self.task.record_progress(report.processed_rows);
            self.publish();
            info!(
                "Progress: {}/{} rows ({:.2}%)",
                self.task.processed_rows, total, self.task.progress
            );

            let crossed = report.processed_rows / interval > last_checkpoint / interval;
            if crossed && report.processed_rows < total {
                match self.checkpoint() {
                    Ok(()) => {
                        last_checkpoint = report.processed_rows;
                        info!("Checkpoint saved at {} rows", report.processed_rows);
                    }
                    Err(e) => warn!(
                        "Checkpoint at {} rows failed, retrying at next batch: {}",
                        report.processed_rows, e
                    ),
                }
            }
        }

        self.finish()
    }

    /// Working table and processed count to start from
    ///
    /// A snapshot is used only when it holds exactly the input's row ids.
    fn working_table(&self, input: Table) -> Result<(Table, usize), TaskError> {
        match self.store.load_snapshot(&self.task.id) {
            Ok(Some(snapshot)) => {
                if !snapshot.table.same_row_ids(&input) {
                    return Err(TaskError::Checkpoint(
                        "snapshot rows do not match the input dataset".to_string(),
                    ));
                }
                Ok((snapshot.table, snapshot.processed_rows))
            }
            Ok(None) => Ok((self.fresh(input), 0)),
            Err(e) => {
                warn!("Ignoring unreadable snapshot, starting over: {}", e);
                Ok((self.fresh(input), 0))
            }
        }
    }

    fn fresh(&self, mut input: Table) -> Table {
        for column in self.task.target_columns() {
            input.ensure_column(column);
        }
        input
    }

    /// Write the output, then the completed checkpoint
    fn finish(&mut self) -> Result<(), TaskError> {
        let Some(table) = self.table.as_ref() else {
            return Err(TaskError::Checkpoint("no working table".to_string()));
        };

        self.codec
            .write_table(table, &self.task.output_path)
            .map_err(|e| TaskError::OutputWrite(e.to_string()))?;
        info!("Output written to {}", self.task.output_path.display());

        let mut finished = self.task.clone();
        finished.record_progress(table.len());
        finished.complete()?;
        self.store.save(&finished, table)?;

        self.task = finished;
        self.publish();
        Ok(())
    }

    /// Mark the task failed, checkpoint whatever it has, then publish
    ///
    /// Watchers see `failed` only once the checkpoint is on disk.
    fn abort(&mut self, message: String) {
        if let Err(e) = self.task.fail(message) {
            warn!("Could not mark task failed: {}", e);
            return;
        }

        let saved = match self.table.as_ref() {
            Some(table) => self.store.save(&self.task, table),
            None => self.store.save_metadata(&self.task),
        };
        if let Err(e) = saved {
            warn!("Could not checkpoint failed task: {}", e);
        }
        self.publish();
    }

    fn checkpoint(&self) -> Result<(), TaskError> {
        match self.table.as_ref() {
            Some(table) => Ok(self.store.save(&self.task, table)?),
            None => Ok(()),
        }
    }

    fn publish(&self) {
        self.handle.send_replace(self.task.clone());
    }
}
