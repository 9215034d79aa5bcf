//! Table module - the dataset and the working table

use crate::error::DomainError;
use std::collections::HashMap;
use std::fmt;

/// Empty placeholder written into a target column when extraction fails
/// or produces nothing for a row
pub const SENTINEL: &str = "";

/// Stable identifier of a row
///
/// Taken from a designated index column when the dataset has one, otherwise
/// the row ordinal rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(String);

impl RowId {
    /// Build a row id from the row ordinal
    pub fn ordinal(position: usize) -> Self {
        Self(position.to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single row: its identifier and one value per table column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Stable row identifier
    pub id: RowId,

    /// Cell values, aligned with the table's columns
    pub values: Vec<String>,
}

/// Ordered rows over ordered, named columns
///
/// Every row has exactly one value per column and row ids are unique.
/// The identifier space is fixed at construction: rows can be updated but
/// never added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
    positions: HashMap<RowId, usize>,
}

impl Table {
    /// Build a table from raw records
    ///
    /// Short records are padded with the sentinel and long ones truncated.
    /// If `index_column` names an existing column its values become the row
    /// ids; otherwise the row ordinal is used.
    pub fn from_records(
        columns: Vec<String>,
        records: Vec<Vec<String>>,
        index_column: Option<&str>,
    ) -> Result<Self, DomainError> {
        let width = columns.len();
        let index = index_column.and_then(|name| columns.iter().position(|c| c == name));

        let rows = records
            .into_iter()
            .enumerate()
            .map(|(position, mut values)| {
                values.resize(width, SENTINEL.to_string());
                let id = match index {
                    Some(idx) => RowId::from(values[idx].clone()),
                    None => RowId::ordinal(position),
                };
                Row { id, values }
            })
            .collect();

        Self::from_rows(columns, rows)
    }

    /// Build a table from fully-formed rows, checking width and id uniqueness
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, DomainError> {
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(DomainError::InvalidTable(format!(
                    "duplicate column '{}'",
                    column
                )));
            }
        }

        let mut positions = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            if row.values.len() != columns.len() {
                return Err(DomainError::InvalidTable(format!(
                    "row {} has {} values, expected {}",
                    row.id,
                    row.values.len(),
                    columns.len()
                )));
            }
            if positions.insert(row.id.clone(), position).is_some() {
                return Err(DomainError::InvalidTable(format!(
                    "duplicate row id '{}'",
                    row.id
                )));
            }
        }

        Ok(Self {
            columns,
            rows,
            positions,
        })
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a row
    pub fn position(&self, id: &RowId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Append a column filled with the sentinel unless it already exists
    ///
    /// Returns the column position.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.values.push(SENTINEL.to_string());
        }
        self.columns.len() - 1
    }

    /// Value at a row position and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r.values[col].as_str())
    }

    /// Overwrite a cell addressed by row id
    ///
    /// Returns `false` when the row or column does not exist.
    pub fn set(&mut self, id: &RowId, column: &str, value: impl Into<String>) -> bool {
        let (Some(row), Some(col)) = (self.position(id), self.column_index(column)) else {
            return false;
        };
        self.rows[row].values[col] = value.into();
        true
    }

    /// Whether both tables carry the same row ids in the same order
    pub fn same_row_ids(&self, other: &Table) -> bool {
        self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| a.id == b.id)
    }
}
