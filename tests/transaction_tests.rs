//! Tests for multi-key transactions
//!
//! These tests verify:
//! - Buffered writes are invisible before commit
//! - Atomic visibility of all writes under one commit timestamp
//! - Optimistic conflict detection (first committer wins)
//! - Rollback and terminal-state behavior

use stratadb::{Engine, StrataError, TxState};

fn setup() -> Engine {
    Engine::open_in_memory().unwrap()
}

// =============================================================================
// Visibility Tests
// =============================================================================

#[test]
fn test_writes_invisible_before_commit() {
    let engine = setup();

    let mut tx = engine.begin_transaction();
    tx.insert("t", b"key", b"value").unwrap();

    assert_eq!(engine.get("t", b"key").unwrap(), None);
    assert_eq!(tx.pending_count(), 1);

    tx.commit().unwrap();
    assert_eq!(engine.get("t", b"key").unwrap().as_deref(), Some(&b"value"[..]));
}

#[test]
fn test_all_writes_share_one_commit_timestamp() {
    let engine = setup();

    let mut tx = engine.begin_transaction();
    tx.insert("accounts", b"alice", b"50").unwrap();
    tx.insert("accounts", b"bob", b"150").unwrap();
    tx.insert("audit", b"transfer:1", b"alice->bob:50").unwrap();
    let commit_ts = tx.commit().unwrap();

    // Right at the commit timestamp, every write is visible
    for (table, key) in [
        ("accounts", &b"alice"[..]),
        ("accounts", &b"bob"[..]),
        ("audit", &b"transfer:1"[..]),
    ] {
        assert!(engine.get_snapshot(table, key, commit_ts).unwrap().is_some());
    }
    // Just before it, none are
    for (table, key) in [
        ("accounts", &b"alice"[..]),
        ("accounts", &b"bob"[..]),
        ("audit", &b"transfer:1"[..]),
    ] {
        assert!(engine
            .get_snapshot(table, key, commit_ts - 1)
            .unwrap()
            .is_none());
    }
}

#[test]
fn test_last_buffered_write_wins() {
    let engine = setup();

    let mut tx = engine.begin_transaction();
    tx.insert("t", b"key", b"first").unwrap();
    tx.insert("t", b"key", b"second").unwrap();
    tx.commit().unwrap();

    assert_eq!(engine.get("t", b"key").unwrap().as_deref(), Some(&b"second"[..]));
}

#[test]
fn test_insert_then_delete_folds_to_tombstone() {
    let engine = setup();
    engine.insert("t", b"key", b"old").unwrap();

    let mut tx = engine.begin_transaction();
    tx.insert("t", b"key", b"new").unwrap();
    tx.delete("t", b"key").unwrap();
    tx.commit().unwrap();

    assert_eq!(engine.get("t", b"key").unwrap(), None);
}

#[test]
fn test_delete_of_missing_key_writes_nothing() {
    let engine = setup();

    let mut tx = engine.begin_transaction();
    tx.delete("ghost_table", b"ghost").unwrap();
    tx.commit().unwrap();

    // No tombstone chain and no implicit table, matching the
    // auto-commit delete path
    assert!(engine.table_names().unwrap().is_empty());
    assert_eq!(engine.get("ghost_table", b"ghost").unwrap(), None);

    // Insert-then-delete of a fresh key nets to absence the same way
    let mut tx = engine.begin_transaction();
    tx.insert("t", b"fresh", b"v").unwrap();
    tx.delete("t", b"fresh").unwrap();
    tx.commit().unwrap();

    assert!(engine.table_names().unwrap().is_empty());
}

// =============================================================================
// Conflict Tests
// =============================================================================

#[test]
fn test_write_write_conflict_first_committer_wins() {
    let engine = setup();
    engine.insert("t", b"key", b"base").unwrap();

    let mut tx1 = engine.begin_transaction();
    let mut tx2 = engine.begin_transaction();
    tx1.insert("t", b"key", b"from_tx1").unwrap();
    tx2.insert("t", b"key", b"from_tx2").unwrap();

    tx1.commit().unwrap();
    let err = tx2.commit().unwrap_err();

    assert!(matches!(err, StrataError::Conflict(_)));
    assert_eq!(tx2.state(), TxState::RolledBack);
    assert_eq!(engine.get("t", b"key").unwrap().as_deref(), Some(&b"from_tx1"[..]));
}

#[test]
fn test_conflicting_commit_applies_nothing() {
    let engine = setup();
    engine.insert("t", b"contended", b"base").unwrap();

    let mut winner = engine.begin_transaction();
    let mut loser = engine.begin_transaction();
    winner.insert("t", b"contended", b"w").unwrap();
    loser.insert("t", b"untouched", b"l").unwrap();
    loser.insert("t", b"contended", b"l").unwrap();

    winner.commit().unwrap();
    assert!(loser.commit().is_err());

    // The loser's non-conflicting write must not have leaked through
    assert_eq!(engine.get("t", b"untouched").unwrap(), None);
    assert_eq!(engine.get("t", b"contended").unwrap().as_deref(), Some(&b"w"[..]));
}

#[test]
fn test_disjoint_transactions_both_commit() {
    let engine = setup();

    let mut tx1 = engine.begin_transaction();
    let mut tx2 = engine.begin_transaction();
    tx1.insert("t", b"a", b"1").unwrap();
    tx2.insert("t", b"b", b"2").unwrap();

    let ts1 = tx1.commit().unwrap();
    let ts2 = tx2.commit().unwrap();

    assert!(ts2 > ts1);
    assert_eq!(engine.get("t", b"a").unwrap().as_deref(), Some(&b"1"[..]));
    assert_eq!(engine.get("t", b"b").unwrap().as_deref(), Some(&b"2"[..]));
}

// =============================================================================
// Rollback / Lifecycle Tests
// =============================================================================

#[test]
fn test_rollback_discards_buffer() {
    let engine = setup();
    engine.insert("t", b"key", b"original").unwrap();

    let mut tx = engine.begin_transaction();
    tx.insert("t", b"key", b"changed").unwrap();
    tx.delete("t", b"key").unwrap();
    tx.rollback().unwrap();

    assert_eq!(tx.state(), TxState::RolledBack);
    assert_eq!(engine.get("t", b"key").unwrap().as_deref(), Some(&b"original"[..]));
}

#[test]
fn test_terminal_states_reject_operations() {
    let engine = setup();

    let mut committed = engine.begin_transaction();
    committed.insert("t", b"a", b"1").unwrap();
    committed.commit().unwrap();
    assert!(matches!(
        committed.insert("t", b"b", b"2"),
        Err(StrataError::State(_))
    ));
    assert!(matches!(committed.commit(), Err(StrataError::State(_))));

    let mut rolled_back = engine.begin_transaction();
    rolled_back.rollback().unwrap();
    assert!(matches!(
        rolled_back.delete("t", b"a"),
        Err(StrataError::State(_))
    ));
    assert!(matches!(rolled_back.rollback(), Err(StrataError::State(_))));
}

#[test]
fn test_dropped_transaction_deregisters() {
    let engine = setup();

    let tx = engine.begin_transaction();
    assert_eq!(engine.active_transaction_count(), 1);
    drop(tx);
    assert_eq!(engine.active_transaction_count(), 0);
}

#[test]
fn test_empty_commit_succeeds() {
    let engine = setup();

    let mut tx = engine.begin_transaction();
    let commit_ts = tx.commit().unwrap();

    assert!(commit_ts > 0);
    assert_eq!(tx.state(), TxState::Committed);
}

#[test]
fn test_transaction_outliving_engine_fails() {
    let engine = setup();
    let mut tx = engine.begin_transaction();
    tx.insert("t", b"k", b"v").unwrap();

    drop(engine);
    assert!(matches!(tx.commit(), Err(StrataError::State(_))));
}
