//! Index Manager
//!
//! Secondary indexes from column value to primary keys.
//!
//! ## Responsibilities
//! - Maintain (table, column) -> value -> primary-key-set mappings
//! - Stay synchronized with every committed mutation (eager maintenance)
//! - Backfill from current rows at index creation time
//!
//! Secondary indexes are not versioned: they reflect exactly the
//! latest-committed state of their table and support only latest-state
//! lookups, never snapshot reads.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::codec;
use crate::error::{Result, StrataError};
use crate::table::Table;

/// Value -> set of primary keys holding that value
type ValueMap = BTreeMap<Bytes, BTreeSet<Bytes>>;

/// Secondary index registry for one engine
#[derive(Debug, Default)]
pub struct IndexManager {
    /// (table, column) -> value map
    indexes: RwLock<HashMap<(String, String), ValueMap>>,
}

impl IndexManager {
    /// Create an empty index manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index on `(table, column)` and backfill it from the
    /// table's current live rows.
    ///
    /// Fails with `IndexAlreadyExists` for a duplicate definition.
    pub fn create_index(&self, table: &str, column: &str, source: Option<&Table>) -> Result<()> {
        let mut indexes = self.indexes.write();
        let slot = (table.to_string(), column.to_string());

        if indexes.contains_key(&slot) {
            return Err(StrataError::IndexAlreadyExists {
                table: table.to_string(),
                column: column.to_string(),
            });
        }

        let mut values = ValueMap::new();
        if let Some(table_data) = source {
            for (key, value) in table_data.iter_live() {
                if let Some(indexed) = codec::extract_column(key, value, column) {
                    values.entry(indexed).or_default().insert(key.clone());
                }
            }
        }
        indexes.insert(slot, values);
        Ok(())
    }

    /// Drop an index; `NotFound` when it does not exist
    pub fn drop_index(&self, table: &str, column: &str) -> Result<()> {
        let mut indexes = self.indexes.write();
        indexes
            .remove(&(table.to_string(), column.to_string()))
            .map(|_| ())
            .ok_or_else(|| StrataError::NotFound(format!("index on {}.{}", table, column)))
    }

    /// True when an index exists on `(table, column)`
    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.indexes
            .read()
            .contains_key(&(table.to_string(), column.to_string()))
    }

    /// True when any column of `table` is indexed
    pub fn has_any_index(&self, table: &str) -> bool {
        self.indexes.read().keys().any(|(t, _)| t == table)
    }

    /// All index definitions as (table, column) pairs, sorted
    pub fn definitions(&self) -> Vec<(String, String)> {
        let mut defs: Vec<_> = self.indexes.read().keys().cloned().collect();
        defs.sort();
        defs
    }

    /// Primary keys whose `column` equals `value`, in ascending key order.
    ///
    /// Fails with `NotFound` when the index does not exist; an indexed
    /// value with no matches yields an empty vec.
    pub fn lookup(&self, table: &str, column: &str, value: &[u8]) -> Result<Vec<Bytes>> {
        let indexes = self.indexes.read();
        let values = indexes
            .get(&(table.to_string(), column.to_string()))
            .ok_or_else(|| StrataError::NotFound(format!("index on {}.{}", table, column)))?;
        Ok(values
            .get(value)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Apply a committed mutation on `table`/`key` to every index of that
    /// table. `old_value`/`new_value` are the latest-committed value before
    /// and after the mutation (None = absent or tombstoned).
    pub fn apply_change(
        &self,
        table: &str,
        key: &[u8],
        old_value: Option<&[u8]>,
        new_value: Option<&[u8]>,
    ) {
        let mut indexes = self.indexes.write();
        for ((t, column), values) in indexes.iter_mut() {
            if t != table {
                continue;
            }

            if let Some(old) = old_value {
                if let Some(indexed) = codec::extract_column(key, old, column) {
                    if let Some(keys) = values.get_mut(&indexed) {
                        keys.remove(key);
                        if keys.is_empty() {
                            values.remove(&indexed);
                        }
                    }
                }
            }

            if let Some(new) = new_value {
                if let Some(indexed) = codec::extract_column(key, new, column) {
                    values
                        .entry(indexed)
                        .or_default()
                        .insert(Bytes::copy_from_slice(key));
                }
            }
        }
    }
}
