//! Table Store
//!
//! Per-table ordered mapping from key to version chain, the fundamental
//! storage primitive.
//!
//! ## Responsibilities
//! - Ordered key -> VersionChain storage (BTreeMap, lexicographic keys)
//! - Latest-committed reads and live-key counting
//! - Ordered scan / half-open range iteration over live values
//!
//! A `Table` is a passive data structure: timestamp allocation, conflict
//! checking, and locking live in the engine and transaction layers.

use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;

use crate::codec::Key;
use crate::error::Result;
use crate::version::{Version, VersionChain, VersionEntry};

/// One table: an ordered map of key -> version chain
#[derive(Debug, Clone, Default)]
pub struct Table {
    chains: BTreeMap<Key, VersionChain>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version to a key's chain, creating the chain if absent.
    ///
    /// Fails with a conflict if `commit_ts` is not strictly newer than the
    /// chain's head.
    pub fn apply(&mut self, key: &[u8], commit_ts: u64, version: Version) -> Result<()> {
        match self.chains.get_mut(key) {
            Some(chain) => chain.push(commit_ts, version),
            None => {
                self.chains
                    .insert(Bytes::copy_from_slice(key), VersionChain::with_entry(commit_ts, version));
                Ok(())
            }
        }
    }

    /// The version chain for a key, if one exists
    pub fn chain(&self, key: &[u8]) -> Option<&VersionChain> {
        self.chains.get(key)
    }

    /// Head commit timestamp for a key; 0 when the key has no chain
    pub fn latest_ts(&self, key: &[u8]) -> u64 {
        self.chains.get(key).map(|c| c.latest_ts()).unwrap_or(0)
    }

    /// Latest non-tombstone value for a key
    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.chains.get(key).and_then(|c| c.latest_value())
    }

    /// Value visible at `read_ts` (snapshot read)
    pub fn get_at(&self, key: &[u8], read_ts: u64) -> Option<&Bytes> {
        self.chains.get(key).and_then(|c| c.value_at(read_ts))
    }

    /// True when the key currently holds a live value
    pub fn contains_live(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Number of live (non-tombstoned) keys
    pub fn live_count(&self) -> usize {
        self.chains.values().filter(|c| c.is_live()).count()
    }

    /// Total number of version chains, tombstoned keys included
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Ordered iteration over all live (key, value) pairs
    pub fn iter_live(&self) -> impl Iterator<Item = (&Key, &Bytes)> {
        self.chains
            .iter()
            .filter_map(|(k, chain)| chain.latest_value().map(|v| (k, v)))
    }

    /// Ordered iteration over live pairs in the half-open range [start, end)
    pub fn iter_range_live<'a>(
        &'a self,
        start: &[u8],
        end: &[u8],
    ) -> impl Iterator<Item = (&'a Key, &'a Bytes)> {
        // An inverted range is empty, never a panic
        let start = if start > end { end } else { start };
        let start = Bound::Included(Bytes::copy_from_slice(start));
        let end = Bound::Excluded(Bytes::copy_from_slice(end));
        self.chains
            .range((start, end))
            .filter_map(|(k, chain)| chain.latest_value().map(|v| (k, v)))
    }

    /// Ordered iteration over every chain (GC and snapshot serialization)
    pub fn iter_chains(&self) -> impl Iterator<Item = (&Key, &VersionChain)> {
        self.chains.iter()
    }

    /// Garbage-collect this table's chains against a watermark.
    ///
    /// Removes shadowed versions from each chain and drops chains reduced
    /// to a dead tombstone. Returns the number of removed version entries.
    pub fn prune(&mut self, watermark: u64, keep: usize) -> usize {
        let mut removed = 0;
        let mut dead_keys = Vec::new();

        for (key, chain) in self.chains.iter_mut() {
            let (count, dead) = chain.prune(watermark, keep);
            removed += count;
            if dead {
                removed += chain.len();
                dead_keys.push(key.clone());
            }
        }

        for key in dead_keys {
            self.chains.remove(&key);
        }

        removed
    }

    /// Rebuild a table from snapshot entries (ordered per key)
    pub fn from_chains(chains: Vec<(Vec<u8>, Vec<VersionEntry>)>) -> Result<Self> {
        let mut table = Table::new();
        for (key, entries) in chains {
            table
                .chains
                .insert(Bytes::from(key), VersionChain::from_entries(entries)?);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(s: &'static str) -> Version {
        Version::Value(Bytes::from_static(s.as_bytes()))
    }

    #[test]
    fn test_apply_and_get() {
        let mut table = Table::new();
        table.apply(b"k1", 1, live("v1")).unwrap();
        table.apply(b"k1", 2, live("v2")).unwrap();

        assert_eq!(table.get(b"k1").unwrap(), "v2");
        assert_eq!(table.get_at(b"k1", 1).unwrap(), "v1");
        assert!(table.get(b"missing").is_none());
    }

    #[test]
    fn test_apply_stale_timestamp_is_conflict() {
        let mut table = Table::new();
        table.apply(b"k1", 5, live("v1")).unwrap();
        assert!(table.apply(b"k1", 5, live("v2")).is_err());
        assert!(table.apply(b"k1", 3, live("v2")).is_err());
    }

    #[test]
    fn test_live_count_excludes_tombstones() {
        let mut table = Table::new();
        table.apply(b"a", 1, live("1")).unwrap();
        table.apply(b"b", 2, live("2")).unwrap();
        table.apply(b"b", 3, Version::Tombstone).unwrap();

        assert_eq!(table.live_count(), 1);
        assert_eq!(table.chain_count(), 2);
        assert!(!table.contains_live(b"b"));
    }

    #[test]
    fn test_range_is_half_open_and_ordered() {
        let mut table = Table::new();
        for (i, key) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
            table.apply(*key, (i + 1) as u64, live("x")).unwrap();
        }
        table.apply(b"c", 10, Version::Tombstone).unwrap();

        let keys: Vec<_> = table
            .iter_range_live(b"a", b"d")
            .map(|(k, _)| k.clone())
            .collect();
        // [a, d) excludes d; c is tombstoned
        assert_eq!(keys, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    }

    #[test]
    fn test_prune_drops_dead_chains() {
        let mut table = Table::new();
        table.apply(b"gone", 1, live("v")).unwrap();
        table.apply(b"gone", 2, Version::Tombstone).unwrap();
        table.apply(b"kept", 3, live("v")).unwrap();

        let removed = table.prune(100, 1);
        // The shadowed value plus the dead tombstone chain itself
        assert_eq!(removed, 2);
        assert_eq!(table.chain_count(), 1);
        assert!(table.contains_live(b"kept"));
    }
}
