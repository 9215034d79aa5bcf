//! Checkpoint Manager
//!
//! Persists each task as two files under the checkpoint root:
//!
//! ```text
//! <root>/<task-id>.meta.json       CheckpointMeta
//! <root>/<task-id>.snapshot.json   SnapshotRecord
//! ```
//!
//! `save` writes the snapshot before the metadata record. The processed-row
//! count used for resumption lives inside the snapshot, so a crash between
//! the two writes can leave the metadata one checkpoint behind but never
//! ahead of the table it describes.

use crate::codec::CsvCodec;
use crate::fs::{remove_if_exists, write_atomic};
use crate::records::{decode, CheckpointMeta, SnapshotRecord};
use crate::StoreError;
use rowforge_domain::{unix_now, Table, TableCodec, Task, TaskId, TaskStatus};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const META_SUFFIX: &str = ".meta.json";
const SNAPSHOT_SUFFIX: &str = ".snapshot.json";

/// A reloaded working table and the progress it represents
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Rows merged when the snapshot was taken
    pub processed_rows: usize,
    /// Working table
    pub table: Table,
    /// Write timestamp (seconds since epoch)
    pub saved_at: u64,
}

/// Durable per-task checkpoint storage
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    codec: CsvCodec,
}

impl CheckpointStore {
    /// Open (and create if needed) a checkpoint directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            codec: CsvCodec,
        })
    }

    /// Checkpoint directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a task's metadata record
    pub fn metadata_path(&self, id: &TaskId) -> PathBuf {
        self.root.join(format!("{}{}", id, META_SUFFIX))
    }

    /// Location of a task's working-table snapshot
    pub fn snapshot_path(&self, id: &TaskId) -> PathBuf {
        self.root.join(format!("{}{}", id, SNAPSHOT_SUFFIX))
    }

    /// Persist the working table and the task metadata
    ///
    /// The snapshot records `task.processed_rows`, which must be a batch
    /// boundary.
    pub fn save(&self, task: &Task, table: &Table) -> Result<(), StoreError> {
        let now = unix_now();
        let record = SnapshotRecord::from_table(task.id, task.processed_rows, table, now);
        write_atomic(&self.snapshot_path(&task.id), &serde_json::to_vec(&record)?)?;
        self.write_metadata(task, now)?;

        debug!(
            "Checkpoint saved for task {} at {}/{} rows",
            task.id, task.processed_rows, task.total_rows
        );
        Ok(())
    }

    /// Persist only the metadata record (status changes)
    pub fn save_metadata(&self, task: &Task) -> Result<(), StoreError> {
        self.write_metadata(task, unix_now())
    }

    fn write_metadata(&self, task: &Task, now: u64) -> Result<(), StoreError> {
        let meta = CheckpointMeta::from_task(task, now);
        write_atomic(
            &self.metadata_path(&task.id),
            &serde_json::to_vec_pretty(&meta)?,
        )
    }

    /// Load a task from its metadata record
    pub fn load_metadata(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let path = self.metadata_path(id);
        match read_optional(&path)? {
            Some(bytes) => self.task_from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn task_from_bytes(&self, bytes: &[u8]) -> Result<Task, StoreError> {
        let meta: CheckpointMeta = decode(bytes)?;
        let id = TaskId::from_string(&meta.task_id).map_err(StoreError::InvalidData)?;
        meta.into_task(self.metadata_path(&id), self.snapshot_path(&id))
    }

    /// Load the most recent working-table snapshot
    pub fn load_snapshot(&self, id: &TaskId) -> Result<Option<Snapshot>, StoreError> {
        let Some(bytes) = read_optional(&self.snapshot_path(id))? else {
            return Ok(None);
        };

        let record: SnapshotRecord = decode(&bytes)?;
        if record.task_id != id.to_string() {
            return Err(StoreError::InvalidData(format!(
                "snapshot belongs to task {}, expected {}",
                record.task_id, id
            )));
        }

        let processed_rows = record.processed_rows;
        let saved_at = record.saved_at;
        let table = record.into_table()?;
        Ok(Some(Snapshot {
            processed_rows: processed_rows.min(table.len()),
            table,
            saved_at,
        }))
    }

    /// All tasks with a readable metadata record
    ///
    /// Unreadable records are skipped with a warning.
    pub fn scan(&self) -> Result<Vec<Task>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tasks = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_SUFFIX) && !n.starts_with('.'));
            if !is_meta {
                continue;
            }

            match fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|bytes| self.task_from_bytes(&bytes))
            {
                Ok(task) => tasks.push(task),
                Err(e) => warn!("Skipping unreadable checkpoint {}: {}", path.display(), e),
            }
        }
        Ok(tasks)
    }

    /// Remove a task's metadata record and snapshot
    ///
    /// Returns whether anything was removed.
    pub fn delete(&self, id: &TaskId) -> Result<bool, StoreError> {
        let meta = remove_if_exists(&self.metadata_path(id))?;
        let snapshot = remove_if_exists(&self.snapshot_path(id))?;
        if meta || snapshot {
            info!("Deleted checkpoint for task {}", id);
        }
        Ok(meta || snapshot)
    }

    /// Materialise the best available result of a task as a CSV file
    ///
    /// Completed tasks return their final output. Otherwise the last
    /// snapshot is written to `exports_dir`; without a snapshot the input
    /// is exported with every target column set to the sentinel. Either way
    /// the export has the dataset's full row count.
    pub fn export_partial(&self, task: &Task, exports_dir: &Path) -> Result<PathBuf, StoreError> {
        if task.status == TaskStatus::Completed && task.output_path.exists() {
            return Ok(task.output_path.clone());
        }

        let table = match self.load_snapshot(&task.id)? {
            Some(snapshot) => snapshot.table,
            None => {
                debug!("No snapshot for task {}; exporting input", task.id);
                let mut table = self
                    .codec
                    .read_table(&task.input_path, task.index_column.as_deref())?;
                for column in task.target_columns() {
                    table.ensure_column(column);
                }
                table
            }
        };

        let path = exports_dir.join(format!("partial_{}_{}.csv", task.id, unix_now()));
        self.codec.write_table(&table, &path)?;
        info!(
            "Exported partial result of task {} ({} rows) to {}",
            task.id,
            table.len(),
            path.display()
        );
        Ok(path)
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
