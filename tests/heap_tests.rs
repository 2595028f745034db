// Record heap tests
// Byte-level slot storage: append, overwrite, read, tombstone, reopen checks.

use record_heap_db::codec::HEADER;
use record_heap_db::heap::{RecordHeap, SyncPolicy};
use record_heap_db::Error;

const L: usize = 32;

fn line(sn: &str) -> Vec<u8> {
    format!("{sn},ABC123,01/01/2020,0.50,+\n").into_bytes()
}

// =============================================================================
// Test 1: New heap holds only the header
// =============================================================================
#[test]
fn create_writes_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.csv");

    let heap = RecordHeap::create(&path, L, SyncPolicy::Never).unwrap();
    assert!(heap.is_empty());
    assert_eq!(heap.slot_count(), 0);
    assert_eq!(heap.data_start(), HEADER.len() as u64);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), HEADER);
}

// =============================================================================
// Test 2: Appends land back to back, one slot apart
// =============================================================================
#[test]
fn append_returns_consecutive_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = RecordHeap::create(&dir.path().join("db.csv"), L, SyncPolicy::Never).unwrap();

    let a = heap.append(&line("000001")).unwrap();
    let b = heap.append(&line("000002")).unwrap();
    assert_eq!(a, 35);
    assert_eq!(b, 35 + L as u64);
    assert_eq!(heap.len(), 35 + 2 * L as u64);

    assert_eq!(heap.read_at(a).unwrap(), line("000001"));
    assert_eq!(heap.read_at(b).unwrap(), line("000002"));
}

// =============================================================================
// Test 3: Overwrite touches only its own slot
// =============================================================================
#[test]
fn write_at_leaves_neighbours_intact() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = RecordHeap::create(&dir.path().join("db.csv"), L, SyncPolicy::Never).unwrap();

    let a = heap.append(&line("000001")).unwrap();
    let b = heap.append(&line("000002")).unwrap();
    let c = heap.append(&line("000003")).unwrap();

    heap.write_at(b, &line("000009")).unwrap();

    assert_eq!(heap.read_at(a).unwrap(), line("000001"));
    assert_eq!(heap.read_at(b).unwrap(), line("000009"));
    assert_eq!(heap.read_at(c).unwrap(), line("000003"));
    assert_eq!(heap.slot_count(), 3);
}

// =============================================================================
// Test 4: Wrong-length lines are refused without writing
// =============================================================================
#[test]
fn write_of_wrong_length_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = RecordHeap::create(&dir.path().join("db.csv"), L, SyncPolicy::Never).unwrap();
    let a = heap.append(&line("000001")).unwrap();

    assert!(matches!(heap.write_at(a, b"short\n"), Err(Error::Corruption(_))));
    assert!(matches!(heap.append(b"short\n"), Err(Error::Corruption(_))));

    assert_eq!(heap.read_at(a).unwrap(), line("000001"));
    assert_eq!(heap.slot_count(), 1);
}

// =============================================================================
// Test 5: Out-of-range and misaligned offsets
// =============================================================================
#[test]
fn bad_offsets_are_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = RecordHeap::create(&dir.path().join("db.csv"), L, SyncPolicy::Never).unwrap();
    heap.append(&line("000001")).unwrap();

    for offset in [0u64, 34, 36, 67, 1_000, u64::MAX] {
        assert!(
            matches!(heap.read_at(offset), Err(Error::OffsetOutOfRange { .. })),
            "offset {offset} should be rejected"
        );
    }
    assert!(matches!(
        heap.write_at(67, &line("000002")),
        Err(Error::OffsetOutOfRange { offset: 67, heap_len: 67 })
    ));
    assert!(matches!(
        heap.tombstone(67, b"------"),
        Err(Error::OffsetOutOfRange { .. })
    ));
}

// =============================================================================
// Test 6: Tombstone overwrites the primary key columns only
// =============================================================================
#[test]
fn tombstone_replaces_primary_key_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = RecordHeap::create(&dir.path().join("db.csv"), L, SyncPolicy::Never).unwrap();
    let a = heap.append(&line("000001")).unwrap();
    let b = heap.append(&line("000002")).unwrap();

    heap.tombstone(a, b"------").unwrap();

    assert_eq!(heap.read_at(a).unwrap(), b"------,ABC123,01/01/2020,0.50,+\n");
    assert_eq!(heap.read_at(b).unwrap(), line("000002"));
    assert_eq!(heap.len(), 35 + 2 * L as u64);
}

// =============================================================================
// Test 7: Reopen sees everything written
// =============================================================================
#[test]
fn reopen_preserves_slots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.csv");

    {
        let mut heap = RecordHeap::create(&path, L, SyncPolicy::EveryWrite).unwrap();
        heap.append(&line("000001")).unwrap();
        heap.append(&line("000002")).unwrap();
    }

    let heap = RecordHeap::open(&path, L, SyncPolicy::Never).unwrap();
    let slots = heap.slots().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0], (35, line("000001")));
    assert_eq!(slots[1], (67, line("000002")));
}

// =============================================================================
// Test 8: Open creates a missing heap, create refuses an existing one
// =============================================================================
#[test]
fn open_creates_and_create_refuses_existing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.csv");

    let heap = RecordHeap::open(&path, L, SyncPolicy::Never).unwrap();
    assert!(heap.is_empty());
    drop(heap);

    match RecordHeap::create(&path, L, SyncPolicy::Never) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("expected AlreadyExists, got {:?}", other.map(|_| ())),
    }
}

// =============================================================================
// Test 9: Open rejects a bad header or a ragged data region
// =============================================================================
#[test]
fn open_rejects_malformed_files() {
    let dir = tempfile::tempdir().unwrap();

    let bad_header = dir.path().join("bad_header.csv");
    std::fs::write(&bad_header, "id,name\n").unwrap();
    assert!(matches!(
        RecordHeap::open(&bad_header, L, SyncPolicy::Never),
        Err(Error::Corruption(_))
    ));

    let ragged = dir.path().join("ragged.csv");
    std::fs::write(&ragged, format!("{HEADER}000001,ABC")).unwrap();
    assert!(matches!(
        RecordHeap::open(&ragged, L, SyncPolicy::Never),
        Err(Error::Corruption(_))
    ));
}

// =============================================================================
// Test 10: Sync policies
// =============================================================================
#[test]
fn sync_policy_controls_write_counter() {
    let dir = tempfile::tempdir().unwrap();

    let mut every = RecordHeap::create(&dir.path().join("a.csv"), L, SyncPolicy::EveryWrite).unwrap();
    every.append(&line("000001")).unwrap();
    assert_eq!(every.writes_since_sync(), 0);

    let mut batched =
        RecordHeap::create(&dir.path().join("b.csv"), L, SyncPolicy::EveryNWrites(2)).unwrap();
    let a = batched.append(&line("000001")).unwrap();
    assert_eq!(batched.writes_since_sync(), 1);
    batched.tombstone(a, b"------").unwrap();
    assert_eq!(batched.writes_since_sync(), 0, "second write triggers a sync");

    let mut never = RecordHeap::create(&dir.path().join("c.csv"), L, SyncPolicy::Never).unwrap();
    for sn in ["000001", "000002", "000003"] {
        never.append(&line(sn)).unwrap();
    }
    assert_eq!(never.writes_since_sync(), 3);
    never.sync().unwrap();
    assert_eq!(never.writes_since_sync(), 0);
}
