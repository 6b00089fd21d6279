//! MVCC Version Chains
//!
//! Per-key version history enabling snapshot-isolation reads.
//!
//! ## Responsibilities
//! - Keep the committed history of one key ordered by commit timestamp
//! - Resolve the visible version for a given read timestamp
//! - Reject out-of-order version writes (never silently reorder)
//! - Support GC pruning without breaking any reachable snapshot
//!
//! ## Invariants
//! - Timestamps within a chain are strictly increasing
//! - A chain is never empty once created; deletion is a tombstone entry,
//!   not removal, until garbage collection

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// A single version of a key: either a live value or a deletion marker.
///
/// Deletion is a tagged variant rather than a nullable value so that
/// "deleted at ts" and "never existed" stay distinguishable through GC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    /// A live value
    Value(Bytes),

    /// A tombstone (deleted key)
    Tombstone,
}

impl Version {
    /// The contained value, or None for a tombstone
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            Version::Value(v) => Some(v),
            Version::Tombstone => None,
        }
    }

    /// True for tombstones
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Version::Tombstone)
    }
}

/// A version paired with the commit timestamp that made it visible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Commit timestamp assigned when this version was applied
    pub commit_ts: u64,

    /// The value or tombstone
    pub version: Version,
}

/// Ordered-by-commit-timestamp history of one key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChain {
    /// Entries in ascending commit_ts order
    entries: Vec<VersionEntry>,
}

impl VersionChain {
    /// Create a chain with a single initial entry
    pub fn with_entry(commit_ts: u64, version: Version) -> Self {
        Self {
            entries: vec![VersionEntry { commit_ts, version }],
        }
    }

    /// Rebuild a chain from already-ordered entries (snapshot load path).
    ///
    /// Fails if the entries are empty or not strictly increasing.
    pub fn from_entries(entries: Vec<VersionEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(StrataError::Corruption("empty version chain".into()));
        }
        for pair in entries.windows(2) {
            if pair[1].commit_ts <= pair[0].commit_ts {
                return Err(StrataError::Corruption(format!(
                    "version chain out of order: {} after {}",
                    pair[1].commit_ts, pair[0].commit_ts
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Append a new version.
    ///
    /// The commit timestamp must be strictly greater than the chain's
    /// current maximum; anything else is a conflict, never a reorder.
    pub fn push(&mut self, commit_ts: u64, version: Version) -> Result<()> {
        if let Some(last) = self.entries.last() {
            if commit_ts <= last.commit_ts {
                return Err(StrataError::Conflict(format!(
                    "version {} is not newer than chain head {}",
                    commit_ts, last.commit_ts
                )));
            }
        }
        self.entries.push(VersionEntry { commit_ts, version });
        Ok(())
    }

    /// The most recent entry.
    ///
    /// Panics only if the chain is empty, which the constructors prevent.
    pub fn latest(&self) -> &VersionEntry {
        self.entries
            .last()
            .expect("version chain is never empty once created")
    }

    /// Commit timestamp of the most recent entry, or 0 for a chain that
    /// has not been created yet (used by commit-time validation).
    pub fn latest_ts(&self) -> u64 {
        self.entries.last().map(|e| e.commit_ts).unwrap_or(0)
    }

    /// Latest live value; None when the head is a tombstone
    pub fn latest_value(&self) -> Option<&Bytes> {
        self.entries.last().and_then(|e| e.version.value())
    }

    /// True when the most recent entry is a live value
    pub fn is_live(&self) -> bool {
        self.latest_value().is_some()
    }

    /// Snapshot read rule: the entry with the greatest commit_ts <= read_ts
    pub fn visible_at(&self, read_ts: u64) -> Option<&VersionEntry> {
        // Entries are ascending, so walk from the newest end
        self.entries.iter().rev().find(|e| e.commit_ts <= read_ts)
    }

    /// Value visible at `read_ts`; None for tombstone or no visible entry
    pub fn value_at(&self, read_ts: u64) -> Option<&Bytes> {
        self.visible_at(read_ts).and_then(|e| e.version.value())
    }

    /// Number of entries in the chain
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the chain holds no entries (only during GC teardown)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in ascending commit_ts order
    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    /// Garbage-collect entries unreachable by any read timestamp >= `watermark`.
    ///
    /// An entry is removable when a newer entry exists with
    /// `commit_ts <= watermark`: every supported snapshot then resolves to
    /// that newer entry instead. The newest `keep` entries are always
    /// retained regardless of the watermark.
    ///
    /// Returns the number of removed entries and whether the remaining
    /// chain is a single dead tombstone at or below the watermark, in
    /// which case the whole chain may be dropped by the caller (counted
    /// separately).
    pub fn prune(&mut self, watermark: u64, keep: usize) -> (usize, bool) {
        let keep = keep.max(1);

        // Index of the newest entry visible at the watermark, if any
        let boundary = self
            .entries
            .iter()
            .rposition(|e| e.commit_ts <= watermark);

        let removed = match boundary {
            Some(b) => {
                // Entries strictly older than the boundary are shadowed for
                // every read timestamp >= watermark
                let cut = b.min(self.entries.len().saturating_sub(keep));
                self.entries.drain(..cut).count()
            }
            None => 0,
        };

        let dead = self.entries.len() == 1
            && self.entries[0].version.is_tombstone()
            && self.entries[0].commit_ts <= watermark;

        (removed, dead)
    }
}
