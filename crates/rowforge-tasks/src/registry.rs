//! Task registry
//!
//! Process-wide map from task id to the live task. Each entry is a watch
//! channel: the runner driving the task is the only writer, every reader
//! gets a consistent snapshot. Tasks known only from checkpoints are merged
//! into listings on demand.

use crate::error::TaskError;
use rowforge_domain::{Task, TaskId, TaskSummary};
use rowforge_store::CheckpointStore;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

/// Shared handle to a live task; the runner publishes through it
pub type TaskHandle = Arc<watch::Sender<Task>>;

/// Registry of admitted tasks backed by the checkpoint store
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, TaskHandle>>,
    store: Arc<CheckpointStore>,
}

impl TaskRegistry {
    /// Create an empty registry over `store`
    pub fn new(store: Arc<CheckpointStore>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Admit a new task, replacing any finished entry with the same id
    pub fn register(&self, task: Task) -> TaskHandle {
        let id = task.id;
        let handle = Arc::new(watch::Sender::new(task));
        self.lock().insert(id, Arc::clone(&handle));
        handle
    }

    /// Admit `task` unless a non-terminal task with the same id is present
    ///
    /// Returns `Ok(None)` when the existing task is still pending or
    /// processing, and `NotFound` when the task is neither admitted nor
    /// checkpointed (it was deleted). The checks and the insert happen under
    /// one lock, so two concurrent restarts cannot both admit a runner.
    pub fn admit_if_idle(&self, task: Task) -> Result<Option<TaskHandle>, TaskError> {
        let mut tasks = self.lock();
        match tasks.get(&task.id) {
            Some(existing) if !existing.borrow().status.is_terminal() => return Ok(None),
            Some(_) => {}
            None if !self.store.metadata_path(&task.id).exists() => {
                return Err(TaskError::NotFound(task.id));
            }
            None => {}
        }
        let id = task.id;
        let handle = Arc::new(watch::Sender::new(task));
        tasks.insert(id, Arc::clone(&handle));
        Ok(Some(handle))
    }

    /// Live handle of an admitted task
    pub fn handle(&self, id: &TaskId) -> Option<TaskHandle> {
        self.lock().get(id).cloned()
    }

    /// Snapshot of an admitted task
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.handle(id).map(|handle| handle.borrow().clone())
    }

    /// Admitted task, or the task recorded in its checkpoint
    pub fn find(&self, id: &TaskId) -> Result<Option<Task>, TaskError> {
        if let Some(task) = self.get(id) {
            return Ok(Some(task));
        }
        Ok(self.store.load_metadata(id)?)
    }

    /// Summary of one task; admitted tasks win over checkpoints
    pub fn summary(&self, id: &TaskId) -> Result<TaskSummary, TaskError> {
        if let Some(task) = self.get(id) {
            return Ok(task.summary());
        }
        match self.store.load_metadata(id)? {
            Some(task) => Ok(detached(&task)),
            None => Err(TaskError::NotFound(*id)),
        }
    }

    /// Every known task, most recently started first
    ///
    /// Admitted tasks are listed with `in_memory = true`. Tasks found only
    /// in the checkpoint store follow with `in_memory = false`. A failing
    /// store scan is logged and yields only the admitted tasks.
    pub fn list(&self) -> Vec<TaskSummary> {
        let mut summaries: Vec<TaskSummary> = self
            .lock()
            .values()
            .map(|handle| handle.borrow().summary())
            .collect();

        match self.store.scan() {
            Ok(stored) => {
                for task in stored {
                    if !summaries.iter().any(|s| s.task_id == task.id) {
                        summaries.push(detached(&task));
                    }
                }
            }
            Err(e) => warn!("Could not scan checkpoints: {}", e),
        }

        summaries.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.task_id.cmp(&a.task_id))
        });
        summaries
    }

    /// Forget a task and delete its durable artifacts
    ///
    /// Removes the registry entry, the checkpoint metadata and snapshot,
    /// and the final output. A task that is still pending or processing is
    /// refused. The registry stays locked until the files are gone, so a
    /// concurrent restart cannot re-admit the task halfway through.
    pub fn remove(&self, id: &TaskId) -> Result<(), TaskError> {
        let mut tasks = self.lock();
        let running = tasks
            .get(id)
            .map(|handle| !handle.borrow().status.is_terminal());
        if running == Some(true) {
            return Err(TaskError::InvalidRequest(format!(
                "task {} is still running",
                id
            )));
        }

        let admitted = tasks.remove(id).map(|handle| handle.borrow().clone());
        let task = match admitted {
            Some(task) => Some(task),
            None => self.store.load_metadata(id).unwrap_or_else(|e| {
                warn!("Unreadable checkpoint for task {}: {}", id, e);
                None
            }),
        };

        let removed_checkpoint = self.store.delete(id)?;
        if let Some(task) = &task {
            remove_file(&task.output_path)?;
        }
        drop(tasks);

        if task.is_none() && !removed_checkpoint {
            return Err(TaskError::NotFound(*id));
        }
        info!("Deleted task {}", id);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, TaskHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Summary of a task that is not admitted in this process
fn detached(task: &Task) -> TaskSummary {
    TaskSummary {
        in_memory: false,
        ..task.summary()
    }
}

fn remove_file(path: &std::path::Path) -> Result<(), TaskError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TaskError::Store(e.into())),
    }
}
