//! Transaction semantics: NO-STEAL abort rollback and FORCE commit
//! durability.

use std::sync::Arc;

use strata::buffer::BufferError;
use strata::engine::Engine;
use strata::heap::{HeapFile, HeapPage, HeapScan};
use strata::storage::{PageId, TableId, PAGE_SIZE};
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};
use strata::tx::Permissions;
use tempfile::TempDir;

fn int_desc() -> TupleDesc {
    TupleDesc::new(vec![(FieldType::Int, Some("a".to_string()))])
}

fn create_table(engine: &Engine, dir: &TempDir, name: &str) -> TableId {
    let path = dir.path().join(format!("{}.dat", name));
    let file = Arc::new(HeapFile::open(path, int_desc()).unwrap());
    let id = file.id();
    engine.catalog().add_table(file, name, "a");
    id
}

fn int_tuple(v: i32) -> Tuple {
    Tuple::new(int_desc(), vec![Field::Int(v)])
}

fn scan_values(engine: &Arc<Engine>, table: TableId) -> Vec<i32> {
    let tid = engine.begin();
    let file = engine.catalog().file(table).unwrap();
    let mut scan = HeapScan::new(file, Arc::clone(engine.pool()), tid);
    scan.open();
    let mut out = Vec::new();
    while let Some(tuple) = scan.next().unwrap() {
        match tuple.field(0) {
            Field::Int(v) => out.push(*v),
            other => panic!("unexpected field {}", other),
        }
    }
    scan.close();
    engine.commit(tid).unwrap();
    out
}

fn disk_len(engine: &Engine, table: TableId) -> u64 {
    let file = engine.catalog().file(table).unwrap();
    std::fs::metadata(file.path()).unwrap().len()
}

#[test]
fn test_abort_of_page_extending_insert() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let tid = engine.begin();
    engine.pool().insert_tuple(tid, table, int_tuple(7)).unwrap();
    assert_eq!(engine.catalog().file(table).unwrap().num_pages(), 1);

    engine.abort(tid).unwrap();

    // The appended page never reached disk and the cached count is rolled
    // back, so a fresh scan sees nothing.
    assert_eq!(disk_len(&engine, table), 0);
    assert_eq!(engine.catalog().file(table).unwrap().num_pages(), 0);
    assert!(scan_values(&engine, table).is_empty());
}

#[test]
fn test_commit_forces_pages_to_disk() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let tid = engine.begin();
    engine.pool().insert_tuple(tid, table, int_tuple(1)).unwrap();
    engine.pool().insert_tuple(tid, table, int_tuple(2)).unwrap();
    assert_eq!(disk_len(&engine, table), 0);

    engine.commit(tid).unwrap();
    assert_eq!(disk_len(&engine, table), PAGE_SIZE as u64);

    // Read the page back from disk, bypassing the pool: the committed
    // bytes must hold both tuples.
    let file = engine.catalog().file(table).unwrap();
    let page = file.read_page(PageId::new(table, 0)).unwrap();
    assert_eq!(page.iter().count(), 2);
}

#[test]
fn test_abort_restores_committed_page_contents() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let t1 = engine.begin();
    engine.pool().insert_tuple(t1, table, int_tuple(1)).unwrap();
    engine.commit(t1).unwrap();

    // A second transaction dirties the same cached page, then aborts.
    let t2 = engine.begin();
    engine.pool().insert_tuple(t2, table, int_tuple(2)).unwrap();
    engine.abort(t2).unwrap();

    // The revert restores the state t1 committed, not the original empty
    // page image.
    assert_eq!(scan_values(&engine, table), vec![1]);
    assert_eq!(disk_len(&engine, table), PAGE_SIZE as u64);
}

#[test]
fn test_abort_of_delete_restores_tuple() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let t1 = engine.begin();
    engine.pool().insert_tuple(t1, table, int_tuple(9)).unwrap();
    engine.commit(t1).unwrap();

    let t2 = engine.begin();
    let file = engine.catalog().file(table).unwrap();
    let mut scan = HeapScan::new(Arc::clone(&file), Arc::clone(engine.pool()), t2);
    scan.open();
    let victim = scan.next().unwrap().unwrap();
    scan.close();
    engine.pool().delete_tuple(t2, &victim).unwrap();
    engine.abort(t2).unwrap();

    assert_eq!(scan_values(&engine, table), vec![9]);
}

#[test]
fn test_all_frames_dirty_fails_fetch() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(1);
    let table = create_table(&engine, &dir, "t");
    let other = create_table(&engine, &dir, "u");

    // Seed the second table with one committed page.
    let other_file = engine.catalog().file(other).unwrap();
    let other_pid = PageId::new(other, 0);
    other_file
        .write_page(&HeapPage::empty(other_pid, int_desc()))
        .unwrap();

    // Fill the single frame with a dirty page.
    let tid = engine.begin();
    engine.pool().insert_tuple(tid, table, int_tuple(1)).unwrap();

    let err = engine
        .pool()
        .get_page(None, other_pid, Permissions::ReadOnly)
        .unwrap_err();
    assert!(matches!(err, BufferError::AllFramesDirty));

    // Aborting the writer cleans the frame and unblocks the fetch.
    engine.abort(tid).unwrap();
    engine
        .pool()
        .get_page(None, other_pid, Permissions::ReadOnly)
        .unwrap();
}

#[test]
fn test_commit_then_new_transaction_sees_data() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let t1 = engine.begin();
    for v in [3, 1, 4] {
        engine.pool().insert_tuple(t1, table, int_tuple(v)).unwrap();
    }
    engine.commit(t1).unwrap();

    assert_eq!(scan_values(&engine, table), vec![3, 1, 4]);
}
