//! CSV implementation of the tabular codec

use crate::fs::write_atomic;
use crate::StoreError;
use rowforge_domain::{Table, TableCodec};
use std::path::Path;

/// Reads and writes tables as CSV with a header row
///
/// Rows of uneven width are accepted on read and padded or truncated to the
/// header width. Writes are atomic.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCodec;

impl CsvCodec {
    /// Create a codec
    pub fn new() -> Self {
        Self
    }
}

impl TableCodec for CsvCodec {
    type Error = StoreError;

    fn read_table(&self, path: &Path, index_column: Option<&str>) -> Result<Table, Self::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Table::from_records(columns, records, index_column)?)
    }

    fn write_table(&self, table: &Table, path: &Path) -> Result<(), Self::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(&row.values)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;

        write_atomic(path, &bytes)
    }
}
