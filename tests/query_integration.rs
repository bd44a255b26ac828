//! Joins, aggregation, deletes, and statistics over stored tables.

use std::sync::Arc;

use strata::engine::Engine;
use strata::executor::{
    Aggregate, AggregateOp, Delete, ExecNode, Filter, Join, JoinPredicate, Op, Predicate, SeqScan,
};
use strata::heap::HeapFile;
use strata::stats::TableStats;
use strata::storage::TableId;
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};
use tempfile::TempDir;

fn one_int_desc(name: &str) -> TupleDesc {
    TupleDesc::new(vec![(FieldType::Int, Some(name.to_string()))])
}

fn create_table(
    engine: &Engine,
    dir: &TempDir,
    name: &str,
    column: &str,
    values: &[i32],
) -> TableId {
    let path = dir.path().join(format!("{}.dat", name));
    let file = Arc::new(HeapFile::open(path, one_int_desc(column)).unwrap());
    let id = file.id();
    engine.catalog().add_table(file, name, column);

    let tid = engine.begin();
    for v in values {
        let tuple = Tuple::new(one_int_desc(column), vec![Field::Int(*v)]);
        engine.pool().insert_tuple(tid, id, tuple).unwrap();
    }
    engine.commit(tid).unwrap();
    id
}

fn collect_ints(node: &mut ExecNode) -> Vec<Vec<i32>> {
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
fn test_sort_merge_join_multiset() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let left = create_table(&engine, &dir, "r", "a", &[1, 2, 3, 1, 5, 6]);
    let right = create_table(&engine, &dir, "s", "b", &[1, 5, 6, 2, 8, 9]);

    let tid = engine.begin();
    let mut join = ExecNode::Join(Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, left).unwrap()),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, right).unwrap()),
    ));
    join.open().unwrap();
    let mut rows = collect_ints(&mut join);
    join.close();
    engine.commit(tid).unwrap();

    rows.sort();
    assert_eq!(
        rows,
        vec![
            vec![1, 1],
            vec![1, 1],
            vec![2, 2],
            vec![5, 5],
            vec![6, 6],
        ]
    );
}

#[test]
fn test_sort_merge_join_with_duplicates_on_both_sides() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let left = create_table(&engine, &dir, "r", "a", &[1, 1, 2]);
    let right = create_table(&engine, &dir, "s", "b", &[1, 1, 3]);

    let tid = engine.begin();
    let mut join = ExecNode::Join(Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, left).unwrap()),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, right).unwrap()),
    ));
    join.open().unwrap();
    let rows = collect_ints(&mut join);
    join.close();
    engine.commit(tid).unwrap();

    // Every pairing of the two left 1s with the two right 1s.
    assert_eq!(rows, vec![vec![1, 1]; 4]);
}

#[test]
fn test_nested_loop_join_on_inequality() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let left = create_table(&engine, &dir, "r", "a", &[1, 2, 3]);
    let right = create_table(&engine, &dir, "s", "b", &[1, 2]);

    let tid = engine.begin();
    let mut join = ExecNode::Join(Join::new(
        JoinPredicate::new(0, Op::GreaterThan, 0),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, left).unwrap()),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, right).unwrap()),
    ));
    join.open().unwrap();
    let mut rows = collect_ints(&mut join);
    join.close();
    engine.commit(tid).unwrap();

    rows.sort();
    assert_eq!(rows, vec![vec![2, 1], vec![3, 1], vec![3, 2]]);
}

#[test]
fn test_join_schema_is_concatenation() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let left = create_table(&engine, &dir, "r", "a", &[1]);
    let right = create_table(&engine, &dir, "s", "b", &[1]);

    let tid = engine.begin();
    let join = ExecNode::Join(Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, left).unwrap()),
        ExecNode::SeqScan(SeqScan::new(&engine, tid, right).unwrap()),
    ));
    let desc = join.tuple_desc();
    assert_eq!(desc.num_fields(), 2);
    assert_eq!(desc.field_name(0), Some("a"));
    assert_eq!(desc.field_name(1), Some("b"));
    engine.commit(tid).unwrap();
}

#[test]
fn test_grouped_count_over_table() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);

    // Two columns: group key and value.
    let desc = TupleDesc::new(vec![
        (FieldType::Int, Some("g".to_string())),
        (FieldType::Int, Some("v".to_string())),
    ]);
    let file = Arc::new(HeapFile::open(dir.path().join("t.dat"), desc.clone()).unwrap());
    let table = file.id();
    engine.catalog().add_table(file, "t", "g");

    let tid = engine.begin();
    for (g, v) in [(1, 10), (1, 20), (2, 30)] {
        let tuple = Tuple::new(desc.clone(), vec![Field::Int(g), Field::Int(v)]);
        engine.pool().insert_tuple(tid, table, tuple).unwrap();
    }
    engine.commit(tid).unwrap();

    let tid = engine.begin();
    let scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    let mut agg = ExecNode::Aggregate(
        Aggregate::new(scan, 1, Some(0), AggregateOp::Count).unwrap(),
    );
    agg.open().unwrap();
    let mut rows = collect_ints(&mut agg);
    agg.close();
    engine.commit(tid).unwrap();

    rows.sort();
    assert_eq!(rows, vec![vec![1, 2], vec![2, 1]]);
}

#[test]
fn test_ungrouped_avg_over_table() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t", "a", &[2, 4, 6]);

    let tid = engine.begin();
    let scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    let mut agg =
        ExecNode::Aggregate(Aggregate::new(scan, 0, None, AggregateOp::Avg).unwrap());
    agg.open().unwrap();
    let rows = collect_ints(&mut agg);
    agg.close();
    engine.commit(tid).unwrap();

    assert_eq!(rows, vec![vec![4]]);
}

#[test]
fn test_min_over_empty_table_emits_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t", "a", &[]);

    let tid = engine.begin();
    let scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    let mut agg =
        ExecNode::Aggregate(Aggregate::new(scan, 0, None, AggregateOp::Min).unwrap());
    agg.open().unwrap();
    assert!(agg.next().unwrap().is_none());
    agg.close();
    engine.commit(tid).unwrap();
}

#[test]
fn test_delete_through_operator_tree() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let table = create_table(&engine, &dir, "t", "a", &[1, 2, 3, 4]);

    let tid = engine.begin();
    let scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    let filter = ExecNode::Filter(Filter::new(
        Predicate::new(0, Op::GreaterThan, Field::Int(2)),
        scan,
    ));
    let mut delete = ExecNode::Delete(Delete::new(&engine, tid, filter));
    delete.open().unwrap();
    let count = delete.next().unwrap().unwrap();
    assert_eq!(count.field(0), &Field::Int(2));
    delete.close();
    engine.commit(tid).unwrap();

    let tid = engine.begin();
    let mut scan = ExecNode::SeqScan(SeqScan::new(&engine, tid, table).unwrap());
    scan.open().unwrap();
    let mut remaining = collect_ints(&mut scan);
    scan.close();
    engine.commit(tid).unwrap();

    remaining.sort();
    assert_eq!(remaining, vec![vec![1], vec![2]]);
}

#[test]
fn test_table_stats_estimates() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_capacity(10);
    let values: Vec<i32> = (1..=100).collect();
    let table = create_table(&engine, &dir, "t", "a", &values);

    let stats = TableStats::build(&engine, table, 1000.0).unwrap();

    assert_eq!(stats.total_tuples(), 100);
    // 100 four-byte tuples fit on one page.
    assert_eq!(stats.estimate_scan_cost(), 1000.0);
    assert_eq!(stats.estimate_table_cardinality(0.5), 50);

    let eq = stats.estimate_selectivity(0, Op::Equals, &Field::Int(50));
    assert!((eq - 0.01).abs() < 0.005, "eq was {}", eq);
    let gt = stats.estimate_selectivity(0, Op::GreaterThan, &Field::Int(50));
    assert!((gt - 0.5).abs() < 0.1, "gt was {}", gt);
    assert_eq!(stats.estimate_selectivity(0, Op::Equals, &Field::Int(500)), 0.0);
}
