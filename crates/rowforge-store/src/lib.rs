//! Rowforge Storage Layer
//!
//! Durable state for the batch-transformation engine.
//!
//! # Architecture
//!
//! - `CsvCodec`: the tabular codec (`TableCodec`) for datasets and outputs
//! - `CheckpointStore`: per-task metadata record plus working-table snapshot,
//!   both versioned JSON written atomically (temp file, fsync, rename)
//!
//! # Examples
//!
//! ```no_run
//! use rowforge_store::CheckpointStore;
//!
//! let store = CheckpointStore::new("data/checkpoints").unwrap();
//! let tasks = store.scan().unwrap();
//! println!("{} tasks on disk", tasks.len());
//! ```

#![warn(missing_docs)]

mod checkpoint;
mod codec;
mod fs;
pub mod records;

use rowforge_domain::DomainError;
use thiserror::Error;

pub use checkpoint::{CheckpointStore, Snapshot};
pub use codec::CsvCodec;
pub use records::FORMAT_VERSION;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tabular codec error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Data violates a table or task invariant
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Record written by a newer format
    #[error("Unsupported format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found on disk
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}
