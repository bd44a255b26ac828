//! End-to-end: create a table, insert through the operator tree, scan it
//! back.

use std::sync::Arc;

use strata::engine::Engine;
use strata::executor::{ExecNode, Filter, Insert, Op, Predicate, Project, SeqScan, ValuesScan};
use strata::heap::HeapFile;
use strata::storage::TableId;
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};
use tempfile::TempDir;

fn two_int_desc() -> TupleDesc {
    TupleDesc::new(vec![
        (FieldType::Int, Some("a".to_string())),
        (FieldType::Int, Some("b".to_string())),
    ])
}

fn create_table(engine: &Engine, dir: &TempDir, name: &str) -> TableId {
    let path = dir.path().join(format!("{}.dat", name));
    let file = Arc::new(HeapFile::open(path, two_int_desc()).unwrap());
    let id = file.id();
    engine.catalog().add_table(file, name, "a");
    id
}

fn rows(values: &[(i32, i32)]) -> Vec<Tuple> {
    let desc = two_int_desc();
    values
        .iter()
        .map(|(a, b)| Tuple::new(desc.clone(), vec![Field::Int(*a), Field::Int(*b)]))
        .collect()
}

fn collect(node: &mut ExecNode) -> Vec<Vec<i32>> {
    let mut out = Vec::new();
    while let Some(tuple) = node.next().unwrap() {
        out.push(
            tuple
                .fields()
                .iter()
                .map(|f| match f {
                    Field::Int(v) => *v,
                    other => panic!("unexpected field {}", other),
                })
                .collect(),
        );
    }
    out
}

#[test]
fn test_insert_then_scan_in_insertion_order() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let tid = engine.begin();
    let source = ExecNode::ValuesScan(ValuesScan::new(
        two_int_desc(),
        rows(&[(1, 10), (2, 20), (3, 30)]),
    ));
    let mut insert =
        ExecNode::Insert(Insert::new(&engine, tid, source, table).unwrap());
    insert.open().unwrap();
    let count = insert.next().unwrap().unwrap();
    assert_eq!(count.field(0), &Field::Int(3));
    assert!(insert.next().unwrap().is_none());
    insert.close();
    engine.commit(tid).unwrap();

    let tid = engine.begin();
    let mut scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    scan.open().unwrap();
    assert_eq!(collect(&mut scan), vec![vec![1, 10], vec![2, 20], vec![3, 30]]);
    scan.close();
    engine.commit(tid).unwrap();
}

#[test]
fn test_filter_and_project_pipeline() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let tid = engine.begin();
    for (a, b) in [(1, 10), (2, 20), (3, 30)] {
        let tuple = Tuple::new(two_int_desc(), vec![Field::Int(a), Field::Int(b)]);
        engine.pool().insert_tuple(tid, table, tuple).unwrap();
    }
    engine.commit(tid).unwrap();

    let tid = engine.begin();
    let scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    let filter = ExecNode::Filter(Filter::new(
        Predicate::new(1, Op::GreaterThanOrEq, Field::Int(20)),
        scan,
    ));
    let mut project = ExecNode::Project(
        Project::new(vec![1], vec![FieldType::Int], filter).unwrap(),
    );
    project.open().unwrap();
    assert_eq!(project.tuple_desc().field_name(0), Some("b"));
    assert_eq!(collect(&mut project), vec![vec![20], vec![30]]);
    project.close();
    engine.commit(tid).unwrap();
}

#[test]
fn test_rewind_replays_the_scan() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    let tid = engine.begin();
    for (a, b) in [(5, 50), (6, 60)] {
        let tuple = Tuple::new(two_int_desc(), vec![Field::Int(a), Field::Int(b)]);
        engine.pool().insert_tuple(tid, table, tuple).unwrap();
    }
    engine.commit(tid).unwrap();

    let tid = engine.begin();
    let mut scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    scan.open().unwrap();
    let first = collect(&mut scan);
    scan.rewind().unwrap();
    let second = collect(&mut scan);
    assert_eq!(first, second);
    scan.close();
    engine.commit(tid).unwrap();
}

#[test]
fn test_scan_spanning_multiple_pages() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t");

    // Two int columns fit 4096*8/65 = 504 tuples per page; write enough
    // to spill onto a second page.
    let total = 700;
    let tid = engine.begin();
    for i in 0..total {
        let tuple = Tuple::new(two_int_desc(), vec![Field::Int(i), Field::Int(i)]);
        engine.pool().insert_tuple(tid, table, tuple).unwrap();
    }
    engine.commit(tid).unwrap();

    let file = engine.catalog().file(table).unwrap();
    assert!(file.num_pages() >= 2);

    let tid = engine.begin();
    let mut scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    scan.open().unwrap();
    let all = collect(&mut scan);
    assert_eq!(all.len(), total as usize);
    assert_eq!(all[0], vec![0, 0]);
    assert_eq!(all[total as usize - 1], vec![total - 1, total - 1]);
    scan.close();
    engine.commit(tid).unwrap();
}

#[test]
fn test_scan_from_schema_file() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);

    let schema = dir.path().join("schema.txt");
    std::fs::write(&schema, "t (a int pk, b int)\n").unwrap();
    let added = engine.catalog().load_schema(&schema).unwrap();
    assert_eq!(added.len(), 1);
    let table = engine.catalog().table_id("t").unwrap();
    assert_eq!(added[0], table);

    let tid = engine.begin();
    let mut scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    scan.open().unwrap();
    assert!(collect(&mut scan).is_empty());
    scan.close();
    engine.commit(tid).unwrap();
}
