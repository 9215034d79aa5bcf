//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::table::Table;
use std::future::Future;
use std::path::Path;

/// Trait for the external text-generation service
///
/// Implemented by the infrastructure layer (rowforge-llm)
pub trait TextGenerator {
    /// Error type for generation calls
    type Error;

    /// Send one instruction-bearing prompt and return the generated text
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Trait for the tabular file codec
///
/// Implemented by the infrastructure layer (rowforge-store)
pub trait TableCodec {
    /// Error type for codec operations
    type Error;

    /// Read a table; `index_column` selects the row-id column if present
    fn read_table(&self, path: &Path, index_column: Option<&str>) -> Result<Table, Self::Error>;

    /// Write a table, replacing any existing file
    fn write_table(&self, table: &Table, path: &Path) -> Result<(), Self::Error>;
}
