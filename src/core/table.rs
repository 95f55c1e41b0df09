//! Purpose: Typed tabular model for decoded query responses.
//! Exports: `Value`, `ResultSet`, `TableError`.
//! Role: Bridge between raw JSON row-objects and the flattener.
//! Invariants: Column order is the first row's key insertion order (requires
//! Invariants: the `preserve_order` feature of serde_json).
//! Invariants: Every row conforms to the first-row schema; nested values are rejected.

use serde_json::{Map, Number, Value as JsonValue};
use std::error::Error as StdError;
use std::fmt;

/// One scalar cell. Nested JSON values have no representation here.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Value {
    /// Converts a decoded JSON value, or `None` when it is an array or object.
    pub fn from_scalar(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(text) => Some(Value::Text(text.clone())),
            JsonValue::Number(num) => Some(Value::Number(num.clone())),
            JsonValue::Bool(flag) => Some(Value::Bool(*flag)),
            JsonValue::Null => Some(Value::Null),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }
}

impl fmt::Display for Value {
    /// Canonical stringification: the value's natural JSON textual form.
    /// Strings pass through without quoting; null renders as `null`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Number(num) => write!(f, "{num}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Null => f.write_str("null"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TableError {
    Nested { row: usize, column: String },
    MissingColumn { row: usize, column: String },
    ExtraColumn { row: usize, column: String },
    ColumnNotFound { column: String },
    RowNotFound { row: usize },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Nested { row, column } => {
                write!(f, "row {row} column {column} holds a nested value")
            }
            TableError::MissingColumn { row, column } => {
                write!(f, "row {row} is missing column {column}")
            }
            TableError::ExtraColumn { row, column } => {
                write!(f, "row {row} has column {column} outside the first-row schema")
            }
            TableError::ColumnNotFound { column } => {
                write!(f, "no column named {column}")
            }
            TableError::RowNotFound { row } => write!(f, "no row at index {row}"),
        }
    }
}

impl StdError for TableError {}

/// Ordered rows under an explicit column schema derived from the first row.
///
/// Rows are stored positionally; the schema owns the names. A `ResultSet` is
/// immutable once built, matching the one-shot pipeline it feeds.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Builds a result set from decoded row-objects.
    ///
    /// The first row fixes the column schema in its key insertion order.
    /// Every later row must carry exactly that column set; a missing or extra
    /// key is an error rather than a silent reordering.
    pub fn from_rows(raw_rows: &[Map<String, JsonValue>]) -> Result<Self, TableError> {
        let Some(first) = raw_rows.first() else {
            return Ok(Self {
                columns: Vec::new(),
                rows: Vec::new(),
            });
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        let mut rows = Vec::with_capacity(raw_rows.len());
        for (row_index, raw) in raw_rows.iter().enumerate() {
            rows.push(typed_row(raw, &columns, row_index)?);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up one cell by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Result<&Value, TableError> {
        let values = self.rows.get(row).ok_or(TableError::RowNotFound { row })?;
        let position = self
            .columns
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| TableError::ColumnNotFound {
                column: column.to_string(),
            })?;
        Ok(&values[position])
    }
}

fn typed_row(
    raw: &Map<String, JsonValue>,
    columns: &[String],
    row_index: usize,
) -> Result<Vec<Value>, TableError> {
    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        let cell = raw.get(column).ok_or_else(|| TableError::MissingColumn {
            row: row_index,
            column: column.clone(),
        })?;
        let value = Value::from_scalar(cell).ok_or_else(|| TableError::Nested {
            row: row_index,
            column: column.clone(),
        })?;
        values.push(value);
    }
    if raw.len() != columns.len() {
        let extra = raw
            .keys()
            .find(|key| !columns.contains(key))
            .cloned()
            .unwrap_or_default();
        return Err(TableError::ExtraColumn {
            row: row_index,
            column: extra,
        });
    }
    Ok(values)
}
