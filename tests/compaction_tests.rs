// Compaction tests
// Heap rewrite that drops tombstones and reindexes from scratch.

use std::fs;

use record_heap_db::{CompactionStats, Database, Field, IndexPaths, Options, Record};

fn rec(i: u32, sold: &str) -> Record {
    Record::new(format!("{i:06}"), format!("NAME{:02}", i % 4), "01/01/2020", "0.50", sold)
}

// =============================================================================
// Test 1: Tombstones are dropped and survivors are packed
// =============================================================================
#[test]
fn compact_drops_tombstones_and_packs_live_records() {
    let dir = tempfile::tempdir().unwrap();
    let heap_path = dir.path().join("database.csv");
    let mut db = Database::open(&heap_path, IndexPaths::in_dir(dir.path()), Options::default()).unwrap();

    for i in 1..=6 {
        db.insert(&rec(i, if i % 2 == 0 { "+" } else { "-" })).unwrap();
    }
    db.delete(Field::Sold, "-").unwrap();
    assert_eq!(db.free_list().len(), 3);

    let stats = db.compact().unwrap();
    assert_eq!(
        stats,
        CompactionStats {
            live_records: 3,
            reclaimed_slots: 3,
            bytes_before: 35 + 6 * 32,
            bytes_after: 35 + 3 * 32,
        }
    );

    assert_eq!(fs::metadata(&heap_path).unwrap().len(), 35 + 3 * 32);
    assert!(db.free_list().is_empty());

    let live = db.load_all_live().unwrap();
    assert_eq!(live, vec![rec(2, "+"), rec(4, "+"), rec(6, "+")]);
    assert_eq!(db.indices().lookup(Field::Sn, "000002"), &[35]);
    assert_eq!(db.indices().lookup(Field::Sn, "000004"), &[67]);
    assert_eq!(db.indices().lookup(Field::Sn, "000006"), &[99]);
    assert!(db.search(Field::Sold, "-").unwrap().is_empty());

    // Appends continue after the packed region.
    let next = db.insert(&rec(7, "-")).unwrap();
    assert_eq!(next, 35 + 3 * 32);
}

// =============================================================================
// Test 2: Compaction persists the new indices
// =============================================================================
#[test]
fn compacted_indices_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let heap_path = dir.path().join("database.csv");

    let indices = {
        let mut db =
            Database::open(&heap_path, IndexPaths::in_dir(dir.path()), Options::default()).unwrap();
        for i in 1..=4 {
            db.insert(&rec(i, "+")).unwrap();
        }
        db.delete(Field::Sn, "000001").unwrap();
        db.compact().unwrap();
        db.indices().clone()
    };

    let db = Database::open(&heap_path, IndexPaths::in_dir(dir.path()), Options::default()).unwrap();
    assert_eq!(db.indices(), &indices);
    assert!(db.free_list().is_empty());
    assert_eq!(db.get("000003").unwrap(), Some(rec(3, "+")));
    assert!(!dir.path().join("database.csv.compact").exists());
}

// =============================================================================
// Test 3: Compacting a heap without tombstones changes nothing visible
// =============================================================================
#[test]
fn compact_without_tombstones_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let heap_path = dir.path().join("database.csv");
    let mut db = Database::open(&heap_path, IndexPaths::in_dir(dir.path()), Options::default()).unwrap();
    for i in 1..=3 {
        db.insert(&rec(i, "+")).unwrap();
    }
    let before = fs::read(&heap_path).unwrap();

    let stats = db.compact().unwrap();
    assert_eq!(stats.reclaimed_slots, 0);
    assert_eq!(stats.bytes_before, stats.bytes_after);
    assert_eq!(fs::read(&heap_path).unwrap(), before);
}
