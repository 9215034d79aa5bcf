//! Rowforge Tasks
//!
//! Task lifecycle management for the batch-transformation engine.
//!
//! # Overview
//!
//! A task applies a rule set to one dataset. This crate is responsible for:
//! - **Admission**: validating requests and registering tasks in a
//!   process-wide registry
//! - **Running**: driving each task through `pending → processing →
//!   completed | failed` on its own Tokio task
//! - **Checkpointing**: saving the working table every time the processed
//!   count crosses a multiple of the task's interval
//! - **Recovery**: listing tasks from a previous process and resuming them
//!   from their last snapshot
//!
//! # Lifecycle
//!
//! | Status | Entered when | Leaves to |
//! |--------|--------------|-----------|
//! | **pending** | admitted or re-admitted | processing, failed |
//! | **processing** | runner starts | completed, failed |
//! | **completed** | output and final checkpoint written | (terminal) |
//! | **failed** | input read or output write failed | (terminal, restartable) |
//!
//! # Usage
//!
//! ```no_run
//! use rowforge_domain::Rule;
//! use rowforge_llm::MockProvider;
//! use rowforge_tasks::{ServiceConfig, StartRequest, TaskService};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = TaskService::new(ServiceConfig::new("data"), MockProvider::new("[]"))?;
//!     let dataset = service.import_dataset(Path::new("people.csv"), Some("id"))?;
//!
//!     let id = service.start_task(StartRequest {
//!         input_path: dataset.path,
//!         rules: vec![Rule::new("notes", vec!["city".into()], "Extract the city")?],
//!         worker_count: Some(2),
//!         checkpoint_interval: Some(100),
//!         index_column: dataset.index_column,
//!         ..StartRequest::default()
//!     })?;
//!
//!     let summary = service.wait(&id).await?;
//!     println!("{}: {}", summary.task_id, summary.status.as_str());
//!     Ok(())
//! }
//! ```
//!
//! # Data Directory
//!
//! ```text
//! <data_dir>/imports/       imported dataset copies
//! <data_dir>/exports/       processed_<id>_<ts>.csv, partial_<id>_<ts>.csv
//! <data_dir>/checkpoints/   <id>.meta.json, <id>.snapshot.json
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod registry;
mod runner;
mod service;

pub use config::{DataLayout, ServiceConfig, TaskLimits};
pub use error::TaskError;
pub use registry::{TaskHandle, TaskRegistry};
pub use service::{DatasetInfo, StartRequest, TaskService, SAMPLE_ROWS};
