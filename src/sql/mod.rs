//! SQL Module
//!
//! A minimal single-table SQL surface over the key-value engine.
//!
//! ## Responsibilities
//! - Parse one statement at a time with `sqlparser`
//! - Map the supported subset onto engine primitives
//! - Reject everything outside the subset without side effects
//!
//! ## Supported Subset
//!
//! - `CREATE TABLE name (...)` (column definitions are not enforced)
//! - `CREATE INDEX [name] ON table (column)`
//! - `INSERT INTO table (cols...) VALUES (...), ...`
//! - `SELECT * | cols FROM table [WHERE col = literal]`
//! - `UPDATE table SET col = literal, ... [WHERE col = literal]`
//! - `DELETE FROM table [WHERE col = literal]`
//!
//! Rows are string-column maps encoded with the row codec. The first
//! column of an INSERT column list is the primary key; its value becomes
//! the storage key. Every mutating statement runs as one transaction.

mod executor;

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use bytes::Bytes;

use crate::codec::Row;
use crate::engine::Engine;
use crate::error::{Result, StrataError};

/// Result of executing a SQL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlOutcome {
    /// Rows returned by a SELECT, as (primary key, row) in key order
    Rows(Vec<(Bytes, Row)>),

    /// Number of rows affected by a mutating or DDL statement
    Affected(usize),
}

impl SqlOutcome {
    /// Rows returned or affected
    pub fn row_count(&self) -> usize {
        match self {
            SqlOutcome::Rows(rows) => rows.len(),
            SqlOutcome::Affected(n) => *n,
        }
    }

    /// The result rows, if this was a SELECT
    pub fn rows(&self) -> Option<&[(Bytes, Row)]> {
        match self {
            SqlOutcome::Rows(rows) => Some(rows),
            SqlOutcome::Affected(_) => None,
        }
    }
}

/// Parse and execute a single SQL statement against the engine
pub fn execute(engine: &Engine, sql: &str) -> Result<SqlOutcome> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| StrataError::SqlParse(e.to_string()))?;

    match statements.as_slice() {
        [statement] => executor::execute_statement(engine, statement),
        [] => Err(StrataError::SqlParse("empty statement".into())),
        _ => Err(StrataError::SqlUnsupported(
            "multiple statements are not supported".into(),
        )),
    }
}
