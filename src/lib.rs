//! # StrataDB
//!
//! An embedded, table-oriented key-value storage engine with:
//! - MVCC version chains with snapshot reads at any past timestamp
//! - Multi-key ACID transactions with optimistic conflict detection
//! - Secondary indexes with equality lookups
//! - A minimal single-table SQL layer
//! - Checksummed single-file snapshot persistence
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Engine Facade                            │
//! │        (CRUD / scans / transactions / SQL / GC)              │
//! └───────┬─────────────────┬───────────────────┬───────────────┘
//!         │                 │                   │
//!         ▼                 ▼                   ▼
//!  ┌─────────────┐   ┌─────────────┐    ┌─────────────┐
//!  │ SQL Executor│   │ Transaction │    │  Secondary  │
//!  │ (sqlparser) │   │   Manager   │    │   Indexes   │
//!  └──────┬──────┘   └──────┬──────┘    └──────┬──────┘
//!         │                 │                  │
//!         └────────────┬────┴──────────────────┘
//!                      ▼
//!              ┌──────────────┐
//!              │    Tables    │   BTreeMap<Key, VersionChain>
//!              │    (MVCC)    │
//!              └──────┬───────┘
//!                     ▼
//!              ┌──────────────┐
//!              │   Snapshot   │   magic + bincode + CRC32
//!              │ (single file)│
//!              └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod version;
pub mod table;
pub mod index;
pub mod scan;
pub mod txn;
pub mod sql;
pub mod snapshot;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::{Key, Row, Value, KEY_COLUMN};
pub use config::{Config, ConfigBuilder};
pub use engine::Engine;
pub use error::{Result, StatusCode, StrataError};
pub use scan::ScanResult;
pub use sql::SqlOutcome;
pub use txn::{Transaction, TxState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
