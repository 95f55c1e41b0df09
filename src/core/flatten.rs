//! Purpose: Flatten a result set into one bounded comma-delimited payload.
//! Exports: `flatten`, `cell_payload`, `FlattenedString`, `FlattenError`.
//! Role: The validation core of the pipeline; everything upstream feeds this.
//! Invariants: A `FlattenedString` is non-empty and at most 256 UTF-8 bytes.
//! Invariants: Commas in a payload are field separators only; data commas
//! Invariants: become pipes before joining.

use crate::core::table::ResultSet;
use std::error::Error as StdError;
use std::fmt;

/// Hard on-chain payload limit, in UTF-8 bytes.
pub const PAYLOAD_BYTE_CEILING: usize = 256;

/// Separator between (row, column) values in the payload.
pub const FIELD_SEPARATOR: char = ',';

/// Stand-in for literal separators occurring inside a value.
pub const SEPARATOR_ESCAPE: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlattenError {
    EmptyResultSet,
    EmptyPayload,
    CeilingExceeded { byte_len: usize },
    ColumnNotFound { column: String },
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenError::EmptyResultSet => write!(f, "result set has no rows"),
            FlattenError::EmptyPayload => write!(f, "flattened payload is empty"),
            FlattenError::CeilingExceeded { byte_len } => write!(
                f,
                "flattened payload is {byte_len} bytes; the ceiling is {PAYLOAD_BYTE_CEILING}"
            ),
            FlattenError::ColumnNotFound { column } => {
                write!(f, "no column named {column} in the first row")
            }
        }
    }
}

impl StdError for FlattenError {}

/// A validated payload: non-empty, within the byte ceiling.
///
/// Only this module constructs one, so holding a `FlattenedString` is proof
/// the bound was checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlattenedString(String);

impl FlattenedString {
    fn from_checked(payload: String) -> Result<Self, FlattenError> {
        if payload.is_empty() {
            return Err(FlattenError::EmptyPayload);
        }
        let byte_len = payload.len();
        if byte_len > PAYLOAD_BYTE_CEILING {
            return Err(FlattenError::CeilingExceeded { byte_len });
        }
        Ok(Self(payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UTF-8 byte length; always within the ceiling.
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    /// The byte sequence handed to the oracle runtime.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FlattenedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FlattenedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Flattens the whole result set in row-major, schema-column order.
///
/// Every value is stringified canonically and escaped, then values are joined
/// with a separator strictly between elements. The size check runs once on
/// the final accumulation; there is no per-value early abort.
pub fn flatten(result: &ResultSet) -> Result<FlattenedString, FlattenError> {
    if result.is_empty() {
        return Err(FlattenError::EmptyResultSet);
    }

    let mut payload = String::new();
    let mut first = true;
    for row in result.rows() {
        for value in row {
            if !first {
                payload.push(FIELD_SEPARATOR);
            }
            first = false;
            payload.push_str(&escape_separators(&value.to_string()));
        }
    }

    FlattenedString::from_checked(payload)
}

/// Single-cell mode for views known to return one row and one column: the
/// named column of the first row, stringified directly.
///
/// A lone field has no separator ambiguity, so nothing is escaped. The byte
/// ceiling still applies; the output is the same on-chain payload.
pub fn cell_payload(result: &ResultSet, column: &str) -> Result<FlattenedString, FlattenError> {
    if result.is_empty() {
        return Err(FlattenError::EmptyResultSet);
    }
    // Row 0 exists after the emptiness check; only the column lookup can fail.
    let value = result
        .cell(0, column)
        .map_err(|_| FlattenError::ColumnNotFound {
            column: column.to_string(),
        })?;
    FlattenedString::from_checked(value.to_string())
}

fn escape_separators(text: &str) -> String {
    text.chars()
        .map(|ch| if ch == FIELD_SEPARATOR { SEPARATOR_ESCAPE } else { ch })
        .collect()
}
