//! Tests for secondary indexes
//!
//! These tests verify:
//! - Index creation with backfill from existing rows
//! - Eager maintenance through inserts, updates, and deletes
//! - Equality lookups over row columns and the reserved key column
//! - Duplicate-index and missing-index error behavior

use stratadb::{codec, Engine, Row, StrataError, KEY_COLUMN};

fn setup() -> Engine {
    Engine::open_in_memory().unwrap()
}

fn row(pairs: &[(&str, &str)]) -> Vec<u8> {
    let row: Row = pairs
        .iter()
        .map(|(c, v)| (c.to_string(), v.to_string()))
        .collect();
    codec::encode_row(&row).unwrap().to_vec()
}

// =============================================================================
// Creation / Backfill Tests
// =============================================================================

#[test]
fn test_create_index_backfills_existing_rows() {
    let engine = setup();

    engine
        .insert("users", b"u1", &row(&[("id", "u1"), ("city", "oslo")]))
        .unwrap();
    engine
        .insert("users", b"u2", &row(&[("id", "u2"), ("city", "bergen")]))
        .unwrap();
    engine
        .insert("users", b"u3", &row(&[("id", "u3"), ("city", "oslo")]))
        .unwrap();

    engine.create_index("users", "city").unwrap();

    let keys = engine.index_lookup("users", "city", b"oslo").unwrap();
    assert_eq!(keys, vec![&b"u1"[..], &b"u3"[..]]);
}

#[test]
fn test_create_duplicate_index_fails() {
    let engine = setup();

    engine.create_index("users", "city").unwrap();
    assert!(matches!(
        engine.create_index("users", "city"),
        Err(StrataError::IndexAlreadyExists { .. })
    ));
}

#[test]
fn test_drop_index() {
    let engine = setup();

    engine.create_index("users", "city").unwrap();
    assert!(engine.has_index("users", "city"));

    engine.drop_index("users", "city").unwrap();
    assert!(!engine.has_index("users", "city"));
    assert!(matches!(
        engine.drop_index("users", "city"),
        Err(StrataError::NotFound(_))
    ));
}

#[test]
fn test_lookup_without_index_fails() {
    let engine = setup();
    assert!(matches!(
        engine.index_lookup("users", "city", b"oslo"),
        Err(StrataError::NotFound(_))
    ));
}

// =============================================================================
// Maintenance Tests
// =============================================================================

#[test]
fn test_index_tracks_inserts_updates_deletes() {
    let engine = setup();
    engine.create_index("users", "city").unwrap();

    engine
        .insert("users", b"u1", &row(&[("city", "oslo")]))
        .unwrap();
    assert_eq!(
        engine.index_lookup("users", "city", b"oslo").unwrap(),
        vec![&b"u1"[..]]
    );

    // Update moves the key between buckets
    engine
        .insert("users", b"u1", &row(&[("city", "bergen")]))
        .unwrap();
    assert!(engine.index_lookup("users", "city", b"oslo").unwrap().is_empty());
    assert_eq!(
        engine.index_lookup("users", "city", b"bergen").unwrap(),
        vec![&b"u1"[..]]
    );

    // Delete removes the entry
    engine.delete("users", b"u1").unwrap();
    assert!(engine
        .index_lookup("users", "city", b"bergen")
        .unwrap()
        .is_empty());
}

#[test]
fn test_index_maintained_through_transactions() {
    let engine = setup();
    engine.create_index("users", "city").unwrap();

    let mut tx = engine.begin_transaction();
    tx.insert("users", b"u1", &row(&[("city", "oslo")])).unwrap();
    tx.insert("users", b"u2", &row(&[("city", "oslo")])).unwrap();

    // Buffered writes are not indexed yet
    assert!(engine.index_lookup("users", "city", b"oslo").unwrap().is_empty());

    tx.commit().unwrap();
    assert_eq!(
        engine.index_lookup("users", "city", b"oslo").unwrap().len(),
        2
    );
}

#[test]
fn test_index_ignores_rows_without_column() {
    let engine = setup();
    engine.create_index("users", "city").unwrap();

    engine
        .insert("users", b"u1", &row(&[("name", "no_city")]))
        .unwrap();
    engine.insert("users", b"u2", b"raw bytes, not a row").unwrap();

    assert!(engine.index_lookup("users", "city", b"oslo").unwrap().is_empty());
}

// =============================================================================
// Key Column Tests
// =============================================================================

#[test]
fn test_key_column_indexes_raw_kv_data() {
    let engine = setup();

    engine.insert("cache", b"alpha", b"raw value").unwrap();
    engine.create_index("cache", KEY_COLUMN).unwrap();

    assert_eq!(
        engine.index_lookup("cache", KEY_COLUMN, b"alpha").unwrap(),
        vec![&b"alpha"[..]]
    );

    engine.delete("cache", b"alpha").unwrap();
    assert!(engine
        .index_lookup("cache", KEY_COLUMN, b"alpha")
        .unwrap()
        .is_empty());
}

// =============================================================================
// Unversioned Semantics Tests
// =============================================================================

#[test]
fn test_index_reflects_latest_state_only() {
    let engine = setup();
    engine.create_index("users", "city").unwrap();

    engine
        .insert("users", b"u1", &row(&[("city", "oslo")]))
        .unwrap();
    let old_ts = engine.current_timestamp();
    engine
        .insert("users", b"u1", &row(&[("city", "bergen")]))
        .unwrap();

    // The old version is still readable through a snapshot, but the index
    // only answers for the latest committed state
    assert!(engine.get_snapshot("users", b"u1", old_ts).unwrap().is_some());
    assert!(engine.index_lookup("users", "city", b"oslo").unwrap().is_empty());
}

#[test]
fn test_index_survives_save_and_reload() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("db.strata");

    {
        let engine = Engine::open(&path).unwrap();
        engine
            .insert("users", b"u1", &row(&[("city", "oslo")]))
            .unwrap();
        engine.create_index("users", "city").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(&path).unwrap();
    assert!(engine.has_index("users", "city"));
    assert_eq!(
        engine.index_lookup("users", "city", b"oslo").unwrap(),
        vec![&b"u1"[..]]
    );
}
