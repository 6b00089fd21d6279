//! Engine Module
//!
//! The storage engine facade that coordinates all components.
//!
//! ## Responsibilities
//! - Own the table map, secondary indexes, and the timestamp oracle
//! - Auto-commit single operations as one-write transactions
//! - Apply transaction batches atomically under one commit timestamp
//! - Serve latest-committed and snapshot reads without blocking writers
//! - Drive persistence (snapshot save/load) and garbage collection
//!
//! ## Concurrency Model: Multi-Reader / Serialized-Commit
//!
//! - **Reads** (get/get_snapshot/scan/range/count): take only the read
//!   side of the table-map RwLock; they observe already-committed version
//!   chains and never wait on an in-flight transaction.
//! - **Commits** (auto-commit ops, transaction commit, insert_versioned):
//!   serialize on the write lock; a commit either fully applies or fully
//!   fails (optimistic conflict detection against chain heads).
//! - **GC**: runs under the write lock, exclusive with commits, so it can
//!   never remove a version a registered snapshot still needs.
//!
//! Lock order is always table map first, then indexes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::index::IndexManager;
use crate::scan::ScanResult;
use crate::snapshot::{self, EngineSnapshot};
use crate::sql::{self, SqlOutcome};
use crate::table::Table;
use crate::txn::{PendingWrite, Transaction, TransactionManager, WriteOp};
use crate::version::Version;

// =============================================================================
// Engine Internals
// =============================================================================

/// Shared engine state. Transactions hold this weakly, so operations on a
/// transaction that outlived its engine fail with a state error instead
/// of dangling.
#[derive(Debug)]
pub(crate) struct EngineInner {
    config: Config,
    tables: RwLock<BTreeMap<String, Table>>,
    indexes: IndexManager,
    txns: TransactionManager,
}

impl EngineInner {
    pub(crate) fn txns(&self) -> &TransactionManager {
        &self.txns
    }

    /// Apply a write batch as one atomic commit.
    ///
    /// The batch is folded to its net effect per (table, key), last
    /// buffered write wins, so the whole batch shares a single commit
    /// timestamp without violating chain ordering. Validation runs before
    /// any mutation: with a `read_ts`, any target chain that advanced past
    /// it lost the race to another commit and the entire batch fails with
    /// `Conflict`, applying nothing. Auto-committed single operations pass
    /// no `read_ts`; they have no snapshot to validate against.
    pub(crate) fn commit_batch(&self, writes: &[PendingWrite], read_ts: Option<u64>) -> Result<u64> {
        let mut tables = self.tables.write();
        let commit_ts = self.txns.allocate_commit_ts();

        // Step 1: Fold to net effect, preserving key order
        let mut net: BTreeMap<(&str, &[u8]), &WriteOp> = BTreeMap::new();
        for write in writes {
            net.insert((write.table.as_str(), write.key.as_ref()), &write.op);
        }

        // Step 2: Validate every target chain before touching anything
        for (table, key) in net.keys() {
            let head = match tables.get(*table) {
                Some(t) => t.latest_ts(key),
                None => continue,
            };
            if let Some(read_ts) = read_ts {
                if head > read_ts {
                    return Err(StrataError::Conflict(format!(
                        "chain for {:?} in '{}' advanced to {} past read timestamp {}",
                        key, table, head, read_ts
                    )));
                }
            }
            if head >= commit_ts {
                return Err(StrataError::Conflict(format!(
                    "chain for {:?} in '{}' advanced to {} past commit timestamp {}",
                    key, table, head, commit_ts
                )));
            }
        }

        // Step 3: Apply all writes and keep indexes synchronized
        for ((table, key), op) in net {
            // A net delete of a key that never existed writes nothing: no
            // chain, no tombstone, no implicit table
            if matches!(op, WriteOp::Delete)
                && tables.get(table).map_or(true, |t| t.chain(key).is_none())
            {
                continue;
            }

            let t = tables.entry(table.to_string()).or_default();
            let old = t.get(key).cloned();
            let version = match op {
                WriteOp::Insert(value) => Version::Value(value.clone()),
                WriteOp::Delete => Version::Tombstone,
            };
            let new = version.value().cloned();
            t.apply(key, commit_ts, version)?;
            self.indexes
                .apply_change(table, key, old.as_deref(), new.as_deref());
        }

        Ok(commit_ts)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The main storage engine handle.
///
/// Owns all tables, indexes, and the commit-timestamp counter. Returned
/// values and scan results are owned copies, released automatically.
#[derive(Debug)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a file-backed engine at `path`.
    ///
    /// Loads the snapshot when the file exists, otherwise starts empty;
    /// the first `flush()`/`close()` creates the file.
    pub fn open(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::with_config(config)
    }

    /// Open an engine with no persistence backing.
    ///
    /// `flush()` is a successful no-op; `save_to_file` with an explicit
    /// path still works.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Open or create an engine with the given config
    pub fn with_config(config: Config) -> Result<Self> {
        if let Some(path) = config.path.clone() {
            if path.exists() {
                return Self::from_snapshot(snapshot::load_from_file(&path)?, config);
            }
        }

        info!(
            in_memory = config.path.is_none(),
            "opened empty engine"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                tables: RwLock::new(BTreeMap::new()),
                indexes: IndexManager::new(),
                txns: TransactionManager::new(),
            }),
        })
    }

    /// Reconstruct an engine from a snapshot file.
    ///
    /// Unlike [`Engine::open`], the file must exist. The resulting engine
    /// is file-backed at `path`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::from_snapshot(snapshot::load_from_file(path)?, config)
    }

    fn from_snapshot(snap: EngineSnapshot, config: Config) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for (name, chains) in snap.tables {
            tables.insert(name, Table::from_chains(chains)?);
        }

        // Index contents are rebuilt from latest rows, not persisted
        let indexes = IndexManager::new();
        for (table, column) in &snap.indexes {
            indexes.create_index(table, column, tables.get(table))?;
        }

        info!(
            tables = tables.len(),
            indexes = snap.indexes.len(),
            last_commit_ts = snap.last_commit_ts,
            "engine restored from snapshot"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                tables: RwLock::new(tables),
                indexes,
                txns: TransactionManager::with_oracle_at(snap.last_commit_ts),
            }),
        })
    }

    /// Close the engine gracefully.
    ///
    /// File-backed engines save a final snapshot when `save_on_close` is
    /// set. Dropping without `close()` skips the save (crash semantics);
    /// outstanding transactions become unusable either way.
    pub fn close(self) -> Result<()> {
        if self.inner.config.save_on_close {
            if let Some(path) = self.inner.config.path.clone() {
                self.save_to_file(&path)?;
            }
        }
        if self.inner.txns.active_count() > 0 {
            warn!(
                active = self.inner.txns.active_count(),
                "engine closed with active transactions"
            );
        }
        Ok(())
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Insert a key-value pair, creating the table implicitly.
    ///
    /// Outside a transaction this is an auto-committed single-operation
    /// transaction with its own commit timestamp.
    pub fn insert(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.commit_batch(&[PendingWrite {
            table: table.to_string(),
            key: Bytes::copy_from_slice(key),
            op: WriteOp::Insert(Bytes::copy_from_slice(value)),
        }], None)?;
        Ok(())
    }

    /// Latest committed value for a key.
    ///
    /// Always observes the most recent committed state; tombstoned and
    /// absent keys are both `Ok(None)`.
    pub fn get(&self, table: &str, key: &[u8]) -> Result<Option<Bytes>> {
        let tables = self.inner.tables.read();
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    /// Delete a key by appending a tombstone version.
    ///
    /// Returns whether a live value existed. Deleting from a missing
    /// table or a missing/already-deleted key is `Ok(false)` and creates
    /// nothing; the chain itself survives until garbage collection.
    pub fn delete(&self, table: &str, key: &[u8]) -> Result<bool> {
        {
            let tables = self.inner.tables.read();
            match tables.get(table) {
                Some(t) if t.contains_live(key) => {}
                _ => return Ok(false),
            }
        }

        self.inner.commit_batch(&[PendingWrite {
            table: table.to_string(),
            key: Bytes::copy_from_slice(key),
            op: WriteOp::Delete,
        }], None)?;
        Ok(true)
    }

    /// Number of live (non-tombstoned) keys; 0 for a missing table
    pub fn count(&self, table: &str) -> Result<usize> {
        let tables = self.inner.tables.read();
        Ok(tables.get(table).map(|t| t.live_count()).unwrap_or(0))
    }

    /// Create a table explicitly (tables are otherwise created on first
    /// insert). Creating an existing table is a no-op.
    pub fn create_table(&self, table: &str) -> Result<()> {
        self.inner.tables.write().entry(table.to_string()).or_default();
        Ok(())
    }

    /// All table names in ascending order
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.inner.tables.read().keys().cloned().collect())
    }

    // =========================================================================
    // Scan / Range
    // =========================================================================

    /// Materialize every live (key, value) pair in ascending key order
    pub fn scan(&self, table: &str) -> Result<ScanResult> {
        let tables = self.inner.tables.read();
        let entries = tables
            .get(table)
            .map(|t| {
                t.iter_live()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ScanResult::new(entries))
    }

    /// Materialize live pairs in the half-open key range `[start, end)`
    pub fn range(&self, table: &str, start: &[u8], end: &[u8]) -> Result<ScanResult> {
        let tables = self.inner.tables.read();
        let entries = tables
            .get(table)
            .map(|t| {
                t.iter_range_live(start, end)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ScanResult::new(entries))
    }

    // =========================================================================
    // MVCC Operations
    // =========================================================================

    /// Current oracle position without incrementing
    pub fn current_timestamp(&self) -> u64 {
        self.inner.txns.current_ts()
    }

    /// Allocate a fresh commit timestamp.
    ///
    /// Strictly increasing and never reused; call at most once per
    /// committing transaction.
    pub fn allocate_commit_ts(&self) -> u64 {
        self.inner.txns.allocate_commit_ts()
    }

    /// Write a version directly at `commit_ts` (None = tombstone).
    ///
    /// Fails with a conflict if the key's chain has already advanced to
    /// `commit_ts` or beyond; out-of-order writes are rejected, never
    /// reordered. Secondary indexes stay synchronized since a successful
    /// write is by definition the new latest version.
    pub fn insert_versioned(
        &self,
        table: &str,
        key: &[u8],
        value: Option<&[u8]>,
        commit_ts: u64,
    ) -> Result<()> {
        let mut tables = self.inner.tables.write();
        let t = tables.entry(table.to_string()).or_default();

        let old = t.get(key).cloned();
        let version = match value {
            Some(v) => Version::Value(Bytes::copy_from_slice(v)),
            None => Version::Tombstone,
        };
        let new = version.value().cloned();
        t.apply(key, commit_ts, version)?;
        self.inner
            .indexes
            .apply_change(table, key, old.as_deref(), new.as_deref());

        // Keep the oracle ahead of explicitly supplied timestamps so
        // subsequent allocations stay strictly newer
        self.inner.txns.advance_to(commit_ts);
        Ok(())
    }

    /// Snapshot read: the value from the version with the greatest
    /// commit timestamp <= `read_ts`.
    ///
    /// A reader bound to `read_ts` never observes later commits; a
    /// visible tombstone or no visible version is `Ok(None)`.
    pub fn get_snapshot(&self, table: &str, key: &[u8], read_ts: u64) -> Result<Option<Bytes>> {
        let tables = self.inner.tables.read();
        Ok(tables
            .get(table)
            .and_then(|t| t.get_at(key, read_ts))
            .cloned())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a transaction with an empty write buffer.
    ///
    /// No commit timestamp is assigned until commit. The transaction's
    /// read timestamp is registered so GC preserves its snapshot.
    pub fn begin_transaction(&self) -> Transaction {
        let (id, read_ts) = self.inner.txns.begin();
        debug!(tx_id = id, read_ts, "transaction started");
        Transaction::new(Arc::downgrade(&self.inner), id, read_ts)
    }

    /// Number of in-flight transactions
    pub fn active_transaction_count(&self) -> usize {
        self.inner.txns.active_count()
    }

    // =========================================================================
    // Secondary Indexes
    // =========================================================================

    /// Create an index on `(table, column)`, backfilling from current rows
    pub fn create_index(&self, table: &str, column: &str) -> Result<()> {
        let tables = self.inner.tables.read();
        self.inner
            .indexes
            .create_index(table, column, tables.get(table))
    }

    /// Drop an index
    pub fn drop_index(&self, table: &str, column: &str) -> Result<()> {
        self.inner.indexes.drop_index(table, column)
    }

    /// True when an index exists on `(table, column)`
    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.inner.indexes.has_index(table, column)
    }

    /// Primary keys whose `column` equals `value` (latest state only;
    /// secondary indexes are not versioned)
    pub fn index_lookup(&self, table: &str, column: &str, value: &[u8]) -> Result<Vec<Bytes>> {
        self.inner.indexes.lookup(table, column, value)
    }

    // =========================================================================
    // SQL
    // =========================================================================

    /// Execute a minimal single-table SQL statement.
    ///
    /// Mutating statements run as one transaction: either every affected
    /// row changes or none does. Unsupported or malformed SQL fails
    /// without side effects.
    pub fn execute_sql(&self, statement: &str) -> Result<SqlOutcome> {
        sql::execute(self, statement)
    }

    // =========================================================================
    // Persistence & Maintenance
    // =========================================================================

    /// Persist the full engine state to the backing file.
    ///
    /// A successful no-op for in-memory engines.
    pub fn flush(&self) -> Result<()> {
        match self.inner.config.path.clone() {
            Some(path) => self.save_to_file(&path),
            None => Ok(()),
        }
    }

    /// Write a consistent snapshot of the full engine state to `path`.
    ///
    /// Atomic from the caller's perspective: the previous file is only
    /// replaced once the new snapshot is fully on disk.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let snap = {
            let tables = self.inner.tables.read();
            EngineSnapshot {
                last_commit_ts: self.inner.txns.current_ts(),
                tables: tables
                    .iter()
                    .map(|(name, t)| {
                        (
                            name.clone(),
                            t.iter_chains()
                                .map(|(k, chain)| (k.to_vec(), chain.entries().to_vec()))
                                .collect(),
                        )
                    })
                    .collect(),
                indexes: self.inner.indexes.definitions(),
            }
        };
        snapshot::save_to_file(&snap, path)
    }

    /// Garbage-collect version-chain entries unreachable by any supported
    /// read timestamp.
    ///
    /// The watermark is the minimum active transaction read timestamp,
    /// or the current timestamp when nothing is in flight. Runs exclusive
    /// with commits. Returns the number of removed entries.
    pub fn gc(&self) -> Result<usize> {
        let watermark = self
            .inner
            .txns
            .min_active_ts()
            .unwrap_or_else(|| self.inner.txns.current_ts());
        let keep = self.inner.config.gc_keep_versions;

        let mut tables = self.inner.tables.write();
        let mut removed = 0;
        for table in tables.values_mut() {
            removed += table.prune(watermark, keep);
        }

        info!(watermark, removed, "gc pass finished");
        Ok(removed)
    }

    /// Whether the engine encrypts data at rest. Always false: encryption
    /// is not implemented in this engine.
    pub fn is_encrypted(&self) -> bool {
        false
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The backing snapshot path, if file-backed
    pub fn path(&self) -> Option<&PathBuf> {
        self.inner.config.path.as_ref()
    }

    /// The configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
