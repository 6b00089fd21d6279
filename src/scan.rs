//! Scan results
//!
//! Owned, materialized, ordered result sets produced by `scan`/`range`.
//! Entries are copied out at scan time, so a `ScanResult` is independent
//! of its source table and is released simply by dropping it.

use bytes::Bytes;

/// Ordered sequence of (key, value) pairs from a scan or range call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    entries: Vec<(Bytes, Bytes)>,
}

impl ScanResult {
    /// Build a result from already-ordered entries
    pub(crate) fn new(entries: Vec<(Bytes, Bytes)>) -> Self {
        Self { entries }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the scan matched nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The (key, value) pair at `index`, if in bounds
    pub fn get(&self, index: usize) -> Option<(&Bytes, &Bytes)> {
        self.entries.get(index).map(|(k, v)| (k, v))
    }

    /// The key at `index`
    pub fn key_at(&self, index: usize) -> Option<&Bytes> {
        self.entries.get(index).map(|(k, _)| k)
    }

    /// The value at `index`
    pub fn value_at(&self, index: usize) -> Option<&Bytes> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// Iterate over (key, value) pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Values in key order
    pub fn values(&self) -> impl Iterator<Item = &Bytes> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl IntoIterator for ScanResult {
    type Item = (Bytes, Bytes);
    type IntoIter = std::vec::IntoIter<(Bytes, Bytes)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
