//! Rowforge Domain Layer
//!
//! This crate contains the data model of the batch-transformation engine.
//! It has no external dependencies apart from `uuid` and defines the
//! fundamental concepts and trait interfaces that all other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Rule**: one source column, one or more target columns, and a
//!   natural-language instruction realised by an external text-generation call
//! - **Table**: ordered rows with a stable row identifier; the working table is
//!   the input augmented with every target column
//! - **Batch plan**: deterministic partition of a table into fixed-size batches
//! - **Task**: one end-to-end run of a rule set over a dataset, with a small
//!   lifecycle state machine (`pending → processing → completed | failed`)
//!
//! ## Architecture
//!
//! - Pure data and invariants only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for the two external collaborators: the text
//!   generation service and the tabular codec

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod rule;
pub mod status;
pub mod table;
pub mod task;
pub mod traits;

// Re-exports for convenience
pub use batch::BatchPlan;
pub use error::DomainError;
pub use rule::{Rule, RuleId};
pub use status::TaskStatus;
pub use table::{Row, RowId, Table, SENTINEL};
pub use traits::{TableCodec, TextGenerator};
pub use task::{progress_percent, unix_now, Task, TaskId, TaskSummary};
