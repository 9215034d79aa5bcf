//! End-to-end task scenarios against a temporary data directory

use rowforge_domain::{Rule, TableCodec, TaskId, TaskStatus, TextGenerator};
use rowforge_llm::{LlmError, MockProvider};
use rowforge_store::{CheckpointStore, CsvCodec};
use rowforge_tasks::{DataLayout, ServiceConfig, StartRequest, TaskError, TaskService};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

fn write_people(dir: &TempDir, rows: usize) -> PathBuf {
    let path = dir.path().join("people.csv");
    let mut content = String::from("id,text\n");
    for i in 0..rows {
        content.push_str(&format!("p{},text {}\n", i, i));
    }
    fs::write(&path, content).unwrap();
    path
}

fn config(dir: &TempDir) -> ServiceConfig {
    ServiceConfig::new(dir.path().join("data"))
}

fn request(input: &Path, interval: usize) -> StartRequest {
    StartRequest {
        input_path: input.to_path_buf(),
        rules: vec![Rule::new("text", vec!["a".into(), "b".into()], "Split the text").unwrap()],
        worker_count: Some(1),
        checkpoint_interval: Some(interval),
        name: Some("people".to_string()),
        index_column: Some("id".to_string()),
    }
}

/// Echo every record back as `{"row_id": id, "a": "<id>-a", "b": "<id>-b"}`
fn echo(prompt: &str) -> Result<String, LlmError> {
    let items: Vec<String> = prompt
        .lines()
        .filter_map(|line| line.strip_prefix("Record "))
        .filter_map(|rest| rest.split("(row_id: ").nth(1))
        .map(|rest| rest.trim_end_matches("):"))
        .map(|id| format!(r#"{{"row_id": "{0}", "a": "{0}-a", "b": "{0}-b"}}"#, id))
        .collect();
    Ok(format!("[{}]", items.join(",")))
}

fn read_output(path: &Path) -> rowforge_domain::Table {
    CsvCodec.read_table(path, Some("id")).unwrap()
}

/// Echoes until a prompt contains `marker`, then never answers
struct Stall {
    marker: &'static str,
    reached: Mutex<Option<mpsc::Sender<()>>>,
}

impl TextGenerator for Stall {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if !prompt.contains(self.marker) {
            return echo(prompt);
        }
        let reached = self.reached.lock().unwrap().take();
        if let Some(tx) = reached {
            tx.send(()).ok();
        }
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

/// Echoes once the gate has been opened
struct Gate {
    open: Semaphore,
}

impl TextGenerator for Gate {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let _permit = self.open.acquire().await;
        echo(prompt)
    }
}

/// Echoes and records the task's snapshot on disk at every call
///
/// With `unblock` set, the second call removes the directory standing in
/// for the snapshot file.
struct Peek {
    store: CheckpointStore,
    task: Mutex<Option<TaskId>>,
    unblock: bool,
    seen: Mutex<Vec<Option<usize>>>,
}

impl Peek {
    fn new(dir: &TempDir, unblock: bool) -> Self {
        let layout = DataLayout::new(dir.path().join("data"));
        Self {
            store: CheckpointStore::new(layout.checkpoints_dir()).unwrap(),
            task: Mutex::new(None),
            unblock,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn watch(&self, id: TaskId) {
        *self.task.lock().unwrap() = Some(id);
    }

    fn seen(&self) -> Vec<Option<usize>> {
        self.seen.lock().unwrap().clone()
    }
}

impl TextGenerator for Peek {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let Some(id) = *self.task.lock().unwrap() else {
            return echo(prompt);
        };
        let snapshot = self
            .store
            .load_snapshot(&id)
            .ok()
            .flatten()
            .map(|snapshot| snapshot.processed_rows);
        let mut seen = self.seen.lock().unwrap();
        seen.push(snapshot);
        if self.unblock && seen.len() == 2 {
            fs::remove_dir(self.store.snapshot_path(&id)).unwrap();
        }
        drop(seen);
        echo(prompt)
    }
}

#[test]
fn test_interrupted_task_resumes_after_last_checkpoint() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 25);
    let (reached, signal) = mpsc::channel();

    // First process: dies while the third batch is in flight
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let id = runtime.block_on(async {
        let stall = Stall {
            marker: "(row_id: p20)",
            reached: Mutex::new(Some(reached)),
        };
        let service = TaskService::new(config(&dir), stall).unwrap();
        service.start_task(request(&input, 10)).unwrap()
    });
    signal.recv_timeout(Duration::from_secs(10)).unwrap();
    drop(runtime);

    // Second process: finds the task on disk and resumes it
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let llm = MockProvider::from_fn(echo);
        let service = TaskService::new(config(&dir), llm.clone()).unwrap();

        let before = service.status(&id).unwrap();
        assert_eq!(before.status, TaskStatus::Processing);
        assert_eq!(before.processed_rows, 20);
        assert!(!before.in_memory);
        assert!(service.list().iter().any(|s| s.task_id == id && !s.in_memory));

        assert_eq!(service.restart(&id).unwrap(), id);
        let done = service.wait(&id).await.unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.processed_rows, 25);
        assert_eq!(done.progress, 100.0);
        assert_eq!(llm.call_count(), 1);
        assert!(llm.prompts()[0].contains("(row_id: p20)"));
        assert!(!llm.prompts()[0].contains("(row_id: p19)"));

        let output = service.download_result(&id).unwrap().unwrap();
        let table = read_output(&output);
        assert_eq!(table.len(), 25);
        assert_eq!(table.value(0, "a"), Some("p0-a"));
        assert_eq!(table.value(19, "b"), Some("p19-b"));
        assert_eq!(table.value(24, "a"), Some("p24-a"));
    });
}

#[tokio::test]
async fn test_garbled_replies_still_complete() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 25);
    let llm = MockProvider::new("I could not find anything useful here.");
    let service = TaskService::new(config(&dir), llm.clone()).unwrap();

    let id = service.start_task(request(&input, 10)).unwrap();
    let done = service.wait(&id).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.processed_rows, 25);
    assert!(done.error.is_none());
    assert_eq!(llm.call_count(), 3);

    let table = read_output(&service.download_result(&id).unwrap().unwrap());
    assert_eq!(table.columns(), ["id", "text", "a", "b"]);
    for row in 0..25 {
        assert_eq!(table.value(row, "a"), Some(""));
        assert_eq!(table.value(row, "b"), Some(""));
    }
}

#[tokio::test]
async fn test_missing_input_fails_and_restart_recovers() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 12);
    let service = TaskService::new(config(&dir), MockProvider::from_fn(echo)).unwrap();

    // The runner has not been polled yet on this single-threaded runtime
    let id = service.start_task(request(&input, 10)).unwrap();
    let content = fs::read(&input).unwrap();
    fs::remove_file(&input).unwrap();

    let failed = service.wait(&id).await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.processed_rows, 0);
    assert!(failed.error.unwrap().contains("Input read error"));
    assert!(service.download_result(&id).unwrap().is_none());

    fs::write(&input, content).unwrap();
    service.restart(&id).unwrap();
    let done = service.wait(&id).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.error.is_none());
    assert_eq!(done.processed_rows, 12);
}

#[tokio::test]
async fn test_output_failure_keeps_partial_result() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 25);
    let llm = MockProvider::from_fn(echo);
    let service = TaskService::new(config(&dir), llm.clone()).unwrap();

    let id = service.start_task(request(&input, 10)).unwrap();
    let output_path = service.subscribe(&id).unwrap().borrow().output_path.clone();
    fs::create_dir_all(&output_path).unwrap();

    let failed = service.wait(&id).await.unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.processed_rows, 25);
    assert!(failed.error.unwrap().contains("Output write error"));

    let partial = service.download_partial(&id).unwrap();
    let table = read_output(&partial);
    assert_eq!(table.len(), 25);
    assert_eq!(table.value(24, "b"), Some("p24-b"));

    fs::remove_dir(&output_path).unwrap();
    service.restart(&id).unwrap();
    let done = service.wait(&id).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(llm.call_count(), 3);
    assert_eq!(service.download_result(&id).unwrap(), Some(output_path));
}

#[tokio::test]
async fn test_restart_of_running_task_is_noop() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 25);
    let llm = MockProvider::from_fn(echo);
    let service = TaskService::new(config(&dir), llm.clone()).unwrap();

    let id = service.start_task(request(&input, 10)).unwrap();
    assert_eq!(service.restart(&id).unwrap(), id);
    let done = service.wait(&id).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(llm.call_count(), 3);
    assert_eq!(service.list().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_task_and_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 5);
    let service = TaskService::new(config(&dir), MockProvider::from_fn(echo)).unwrap();

    let id = service.start_task(request(&input, 10)).unwrap();
    assert!(matches!(
        service.delete(&id),
        Err(TaskError::InvalidRequest(_))
    ));
    service.wait(&id).await.unwrap();
    let output = service.download_result(&id).unwrap().unwrap();

    service.delete(&id).unwrap();

    assert!(service.list().is_empty());
    assert!(matches!(service.status(&id), Err(TaskError::NotFound(_))));
    assert!(!output.exists());
    let checkpoints = service.layout().checkpoints_dir();
    assert_eq!(fs::read_dir(checkpoints).unwrap().count(), 0);
}

#[tokio::test]
async fn test_start_rejects_invalid_requests() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 5);
    let service = TaskService::new(config(&dir), MockProvider::new("[]")).unwrap();

    let mut unknown_column = request(&input, 10);
    unknown_column.rules = vec![Rule::new("missing", vec!["a".into()], "x").unwrap()];
    assert!(matches!(
        service.start_task(unknown_column),
        Err(TaskError::Domain(_))
    ));

    let mut too_many_workers = request(&input, 10);
    too_many_workers.worker_count = Some(9);
    assert!(matches!(
        service.start_task(too_many_workers),
        Err(TaskError::InvalidRequest(_))
    ));

    let mut no_rules = request(&input, 10);
    no_rules.rules.clear();
    assert!(matches!(
        service.start_task(no_rules),
        Err(TaskError::InvalidRequest(_))
    ));

    let mut missing_input = request(&input, 10);
    missing_input.input_path = dir.path().join("nope.csv");
    assert!(matches!(
        service.start_task(missing_input),
        Err(TaskError::InputRead(_))
    ));

    assert!(service.list().is_empty());
}

#[tokio::test]
async fn test_import_dataset_copies_and_describes() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 8);
    let service = TaskService::new(config(&dir), MockProvider::new("[]")).unwrap();

    let info = service.import_dataset(&input, Some("id")).unwrap();

    assert!(info.import_id.is_some());
    assert!(info.path.starts_with(service.layout().imports_dir()));
    assert!(info.path.exists());
    assert_eq!(info.row_count, 8);
    assert_eq!(info.columns, vec!["id", "text"]);
    assert_eq!(info.index_column.as_deref(), Some("id"));
    assert_eq!(info.sample_rows.len(), 5);
    assert_eq!(info.sample_rows[0], vec!["p0", "text 0"]);

    let inspected = service.inspect_dataset(&input, Some("nope")).unwrap();
    assert!(inspected.import_id.is_none());
    assert!(inspected.index_column.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_task_is_checkpointed_before_it_is_reported() {
    for _ in 0..10 {
        let dir = TempDir::new().unwrap();
        let input = write_people(&dir, 25);
        let gate = Arc::new(Gate {
            open: Semaphore::new(0),
        });
        let service = TaskService::with_generator(config(&dir), Arc::clone(&gate)).unwrap();

        let id = service.start_task(request(&input, 10)).unwrap();
        let output_path = service.subscribe(&id).unwrap().borrow().output_path.clone();
        fs::create_dir_all(&output_path).unwrap();
        gate.open.add_permits(1);

        let failed = service.wait(&id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.processed_rows, 25);

        let table = read_output(&service.download_partial(&id).unwrap());
        assert_eq!(table.value(24, "b"), Some("p24-b"));
        let stored = CheckpointStore::new(service.layout().checkpoints_dir())
            .unwrap()
            .load_metadata(&id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
    }
}

#[tokio::test]
async fn test_failed_checkpoint_is_retried_at_next_batch() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 25);
    let peek = Arc::new(Peek::new(&dir, true));
    let service = TaskService::with_generator(config(&dir), Arc::clone(&peek)).unwrap();

    // The runner has not been polled yet; a directory at the snapshot path
    // makes the first intermediate save fail
    let id = service.start_task(request(&input, 10)).unwrap();
    peek.watch(id);
    let snapshot_path = CheckpointStore::new(service.layout().checkpoints_dir())
        .unwrap()
        .snapshot_path(&id);
    fs::create_dir_all(&snapshot_path).unwrap();

    let done = service.wait(&id).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.error.is_none());
    // Nothing saved at 10 rows, the retry after the second batch saved 20
    assert_eq!(peek.seen(), vec![None, None, Some(20)]);
    assert!(snapshot_path.is_file());
    let table = read_output(&service.download_result(&id).unwrap().unwrap());
    assert_eq!(table.value(24, "a"), Some("p24-a"));
}

#[tokio::test]
async fn test_checkpoint_interval_independent_of_batch_size() {
    let dir = TempDir::new().unwrap();
    let input = write_people(&dir, 45);
    let peek = Arc::new(Peek::new(&dir, false));
    let service = TaskService::with_generator(config(&dir), Arc::clone(&peek)).unwrap();

    let id = service.start_task(request(&input, 15)).unwrap();
    peek.watch(id);
    let done = service.wait(&id).await.unwrap();

    assert_eq!(done.status, TaskStatus::Completed);
    // Batches of 10 with a checkpoint every 15 rows: saved at 20 and 30
    assert_eq!(peek.seen(), vec![None, None, Some(20), Some(30), Some(30)]);
}
