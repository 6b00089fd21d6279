//! Transaction Manager
//!
//! Coordinates begin/commit/rollback, buffers writes, assigns commit
//! timestamps, and tracks active snapshots for garbage collection.
//!
//! ## Lifecycle
//!
//! ```text
//!            begin_transaction
//!                   │
//!                   ▼
//!               ┌────────┐   commit (ok)     ┌───────────┐
//!               │ Active │ ────────────────▶ │ Committed │
//!               └────────┘                   └───────────┘
//!                   │  rollback / drop /
//!                   │  commit (conflict)     ┌────────────┐
//!                   └──────────────────────▶ │ RolledBack │
//!                                            └────────────┘
//! ```
//!
//! Both terminal states reject further operations. An Active transaction
//! that is dropped without committing behaves as if rolled back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::EngineInner;
use crate::error::{Result, StrataError};

// =============================================================================
// Timestamp Oracle
// =============================================================================

/// Source of strictly increasing commit timestamps, scoped to one engine.
///
/// Multiple engines in one process get independent oracles; timestamps are
/// never reused and define the total order over all versioned writes.
#[derive(Debug)]
pub struct TimestampOracle {
    /// Last allocated timestamp; 0 means nothing committed yet
    last_ts: AtomicU64,
}

impl TimestampOracle {
    /// Create an oracle whose next allocation is `start + 1`
    pub fn new(start: u64) -> Self {
        Self {
            last_ts: AtomicU64::new(start),
        }
    }

    /// Allocate and return the next timestamp
    pub fn next(&self) -> u64 {
        self.last_ts.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Read the most recently allocated timestamp without incrementing
    pub fn read(&self) -> u64 {
        self.last_ts.load(Ordering::SeqCst)
    }

    /// Advance the oracle to at least `ts`, keeping future allocations
    /// strictly newer than any externally supplied commit timestamp
    pub fn advance_to(&self, ts: u64) {
        self.last_ts.fetch_max(ts, Ordering::SeqCst);
    }
}

impl Default for TimestampOracle {
    fn default() -> Self {
        Self::new(0)
    }
}

// =============================================================================
// Transaction Manager
// =============================================================================

/// Tracks the oracle and the read timestamps of in-flight transactions.
///
/// The minimum active read timestamp is the GC watermark: no version a
/// registered snapshot could still observe may be collected.
#[derive(Debug, Default)]
pub struct TransactionManager {
    oracle: TimestampOracle,
    /// Active transactions: tx_id -> read_ts
    active: Mutex<HashMap<u64, u64>>,
    /// Transaction id counter, independent of the timestamp domain
    next_id: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the oracle position from a loaded snapshot
    pub fn with_oracle_at(last_ts: u64) -> Self {
        Self {
            oracle: TimestampOracle::new(last_ts),
            active: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new transaction; returns (tx_id, read_ts).
    ///
    /// The read timestamp is the current oracle position: the transaction
    /// observes everything committed so far and nothing after.
    pub fn begin(&self) -> (u64, u64) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let read_ts = self.oracle.read();
        self.active.lock().insert(id, read_ts);
        (id, read_ts)
    }

    /// Deregister a finished transaction (committed, rolled back, dropped)
    pub fn end(&self, id: u64) {
        self.active.lock().remove(&id);
    }

    /// Allocate a commit timestamp; at most once per committing transaction
    pub fn allocate_commit_ts(&self) -> u64 {
        self.oracle.next()
    }

    /// Current oracle position (for non-transactional reads)
    pub fn current_ts(&self) -> u64 {
        self.oracle.read()
    }

    /// Advance the oracle past an externally supplied commit timestamp
    pub fn advance_to(&self, ts: u64) {
        self.oracle.advance_to(ts);
    }

    /// Smallest registered read timestamp, if any transaction is active
    pub fn min_active_ts(&self) -> Option<u64> {
        self.active.lock().values().min().copied()
    }

    /// Number of in-flight transactions
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

// =============================================================================
// Buffered Writes
// =============================================================================

/// A buffered mutation inside a transaction
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Insert(Bytes),
    Delete,
}

/// A pending write targeting one (table, key)
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub table: String,
    pub key: Bytes,
    pub op: WriteOp,
}

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

// =============================================================================
// Transaction
// =============================================================================

/// A multi-key transaction with buffered writes.
///
/// Holds only a weak handle to its engine: a transaction that outlives a
/// closed engine fails with a state error rather than dangling. Writes are
/// buffered locally and applied as one versioned batch at commit, all
/// sharing a single commit timestamp for atomic visibility.
#[derive(Debug)]
pub struct Transaction {
    engine: Weak<EngineInner>,
    id: u64,
    read_ts: u64,
    state: TxState,
    buffer: Vec<PendingWrite>,
}

impl Transaction {
    pub(crate) fn new(engine: Weak<EngineInner>, id: u64, read_ts: u64) -> Self {
        Self {
            engine,
            id,
            read_ts,
            state: TxState::Active,
            buffer: Vec::new(),
        }
    }

    /// Transaction id, unique within the engine
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The snapshot timestamp this transaction reads at
    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }

    /// Current state
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Number of buffered writes
    pub fn pending_count(&self) -> usize {
        self.buffer.len()
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Committed => Err(StrataError::State(
                "transaction is already committed".into(),
            )),
            TxState::RolledBack => Err(StrataError::State(
                "transaction is already rolled back".into(),
            )),
        }
    }

    /// Buffer an insert. Active-only; nothing is visible before commit.
    pub fn insert(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_active()?;
        self.buffer.push(PendingWrite {
            table: table.to_string(),
            key: Bytes::copy_from_slice(key),
            op: WriteOp::Insert(Bytes::copy_from_slice(value)),
        });
        Ok(())
    }

    /// Buffer a delete. Active-only.
    pub fn delete(&mut self, table: &str, key: &[u8]) -> Result<()> {
        self.ensure_active()?;
        self.buffer.push(PendingWrite {
            table: table.to_string(),
            key: Bytes::copy_from_slice(key),
            op: WriteOp::Delete,
        });
        Ok(())
    }

    /// Commit: apply every buffered write under one commit timestamp.
    ///
    /// Either every write becomes visible atomically or, when any target
    /// key was committed to after this transaction's snapshot was taken,
    /// nothing is applied and the transaction ends rolled back with a
    /// conflict error. Returns the commit timestamp.
    pub fn commit(&mut self) -> Result<u64> {
        self.ensure_active()?;

        let engine = self.engine.upgrade().ok_or_else(|| {
            StrataError::State("transaction outlived its engine".into())
        })?;

        let result = engine.commit_batch(&self.buffer, Some(self.read_ts));
        self.buffer.clear();
        engine.txns().end(self.id);

        match result {
            Ok(commit_ts) => {
                self.state = TxState::Committed;
                debug!(tx_id = self.id, commit_ts, "transaction committed");
                Ok(commit_ts)
            }
            Err(e) => {
                // Conflict applies nothing; the transaction is finished
                self.state = TxState::RolledBack;
                debug!(tx_id = self.id, error = %e, "transaction commit failed");
                Err(e)
            }
        }
    }

    /// Rollback: discard the buffer without touching any table state
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.buffer.clear();
        self.state = TxState::RolledBack;
        if let Some(engine) = self.engine.upgrade() {
            engine.txns().end(self.id);
        }
        debug!(tx_id = self.id, "transaction rolled back");
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // An abandoned Active transaction behaves as rolled back: nothing
        // was applied, and its snapshot must stop pinning GC.
        if self.state == TxState::Active {
            if let Some(engine) = self.engine.upgrade() {
                engine.txns().end(self.id);
            }
        }
    }
}
