//! Key/value byte conventions and SQL row encoding
//!
//! Keys and values are opaque byte sequences. All ordering in the engine
//! (range scans, secondary index maps) is ascending lexicographic byte
//! order, which `Bytes`/`[u8]` comparison already provides.
//!
//! SQL-visible rows are a column-name -> string-value map serialized with
//! bincode. Raw key-value inserts never pass through the row codec.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, StrataError};

/// Opaque key type. Ordered lexicographically by byte.
pub type Key = Bytes;

/// Opaque value type.
pub type Value = Bytes;

/// Reserved column name that refers to a row's primary key bytes rather
/// than a decoded column. Used by secondary indexes over raw KV data.
pub const KEY_COLUMN: &str = "key";

/// A SQL-visible row: ordered column-name -> value map.
///
/// Columns are untyped strings in the minimal SQL subset; numeric literals
/// are stored in their textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: BTreeMap<String, String>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    /// Set a column value, returning the previous value if any
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.columns.insert(column.into(), value.into())
    }

    /// Column names in ascending order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// (column, value) pairs in ascending column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, String)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Encode a row into value bytes
pub fn encode_row(row: &Row) -> Result<Value> {
    let bytes = bincode::serialize(row)
        .map_err(|e| StrataError::Serialization(format!("row encode failed: {}", e)))?;
    Ok(Bytes::from(bytes))
}

/// Decode value bytes into a row.
///
/// Fails for values that were written through the raw KV surface rather
/// than the SQL executor.
pub fn decode_row(value: &[u8]) -> Result<Row> {
    bincode::deserialize(value)
        .map_err(|e| StrataError::Serialization(format!("row decode failed: {}", e)))
}

/// Extract the indexable bytes of `column` from a stored (key, value) pair.
///
/// The reserved [`KEY_COLUMN`] resolves to the key bytes themselves, which
/// makes raw KV tables indexable by key. Any other column requires the
/// value to decode as a [`Row`]; values that don't decode simply have no
/// entry for that column.
pub fn extract_column(key: &[u8], value: &[u8], column: &str) -> Option<Bytes> {
    if column == KEY_COLUMN {
        return Some(Bytes::copy_from_slice(key));
    }
    let row = decode_row(value).ok()?;
    row.get(column).map(|v| Bytes::copy_from_slice(v.as_bytes()))
}
