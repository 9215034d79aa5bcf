//! Rowforge Engine
//!
//! Applies extraction rules to a working table, batch by batch, using an
//! external text-generation service.
//!
//! # Architecture
//!
//! ```text
//! BatchScheduler ─┬─ RuleExecutor ── PromptBuilder → TextGenerator → interpret
//!                 ├─ RuleExecutor ── ...
//!                 └─ merge by row id → BatchReport
//! ```
//!
//! # Key Features
//!
//! - **Bounded concurrency**: all rules of a batch run on a pool of
//!   `worker_count` units; the batch is a barrier
//! - **Tolerant parsing**: the reply's first `[` to last `]` is decoded;
//!   anything unusable becomes the empty sentinel, never an abort
//! - **Resumable**: a run can start at any batch index
//!
//! # Example Usage
//!
//! ```no_run
//! use rowforge_domain::{BatchPlan, Rule, Table};
//! use rowforge_engine::{BatchScheduler, EngineConfig, RuleExecutor};
//! use rowforge_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example(mut table: Table) {
//! let rules = vec![Rule::new("text", vec!["city".into()], "Extract the city.").unwrap()];
//! let executor = RuleExecutor::new(Arc::new(MockProvider::new("[]")), EngineConfig::default());
//! let scheduler = BatchScheduler::new(executor, 4);
//!
//! let plan = BatchPlan::new(table.len(), 10).unwrap();
//! let mut run = scheduler.run(&rules, plan, 0);
//! while let Some(report) = run.next(&mut table).await {
//!     println!("{} rows processed", report.processed_rows);
//! }
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod parser;
mod prompt;
mod scheduler;
mod types;


pub use config::EngineConfig;
pub use error::EngineError;
pub use executor::RuleExecutor;
pub use parser::{interpret, ParseOutcome};
pub use prompt::PromptBuilder;
pub use scheduler::{BatchRun, BatchScheduler};
pub use types::{BatchReport, BatchRow, RowUpdate, RuleFailure};
