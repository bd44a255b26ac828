//! The operator tree and its leaf/stateless nodes.

use std::sync::Arc;

use super::aggregate::Aggregate;
use super::dml::{Delete, Insert};
use super::error::ExecutorError;
use super::join::Join;
use super::predicate::Predicate;
use crate::buffer::BufferPool;
use crate::engine::Engine;
use crate::heap::{HeapFile, HeapScan};
use crate::storage::TableId;
use crate::tuple::{FieldType, Tuple, TupleDesc};
use crate::tx::TransactionId;

/// A node of the operator tree.
///
/// `next` returns `Ok(None)` once the node is exhausted; callers drive
/// the tree by pulling from the root.
pub enum ExecNode {
    /// Sequential heap scan.
    SeqScan(SeqScan),
    /// Constant relation over an in-memory tuple list.
    ValuesScan(ValuesScan),
    /// Relational select: keeps tuples passing a predicate.
    Filter(Filter),
    /// Column projection.
    Project(Project),
    /// Relational join (sort-merge on equality, nested loop otherwise).
    Join(Join),
    /// Grouped or ungrouped aggregation.
    Aggregate(Aggregate),
    /// Drains its child into a table, emitting an affected-row count.
    Insert(Insert),
    /// Drains its child deleting each tuple, emitting a count.
    Delete(Delete),
}

impl ExecNode {
    /// Prepares the node for iteration. May materialize and sort.
    pub fn open(&mut self) -> Result<(), ExecutorError> {
        match self {
            ExecNode::SeqScan(n) => n.open(),
            ExecNode::ValuesScan(n) => n.open(),
            ExecNode::Filter(n) => n.open(),
            ExecNode::Project(n) => n.open(),
            ExecNode::Join(n) => n.open(),
            ExecNode::Aggregate(n) => n.open(),
            ExecNode::Insert(n) => n.open(),
            ExecNode::Delete(n) => n.open(),
        }
    }

    /// Returns the next tuple, or `None` when exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        match self {
            ExecNode::SeqScan(n) => n.next(),
            ExecNode::ValuesScan(n) => n.next(),
            ExecNode::Filter(n) => n.next(),
            ExecNode::Project(n) => n.next(),
            ExecNode::Join(n) => n.next(),
            ExecNode::Aggregate(n) => n.next(),
            ExecNode::Insert(n) => n.next(),
            ExecNode::Delete(n) => n.next(),
        }
    }

    /// Restarts iteration from the first tuple.
    pub fn rewind(&mut self) -> Result<(), ExecutorError> {
        match self {
            ExecNode::SeqScan(n) => n.rewind(),
            ExecNode::ValuesScan(n) => n.rewind(),
            ExecNode::Filter(n) => n.rewind(),
            ExecNode::Project(n) => n.rewind(),
            ExecNode::Join(n) => n.rewind(),
            ExecNode::Aggregate(n) => n.rewind(),
            ExecNode::Insert(n) => n.rewind(),
            ExecNode::Delete(n) => n.rewind(),
        }
    }

    /// Releases per-iteration state. The node can be reopened.
    pub fn close(&mut self) {
        match self {
            ExecNode::SeqScan(n) => n.close(),
            ExecNode::ValuesScan(n) => n.close(),
            ExecNode::Filter(n) => n.close(),
            ExecNode::Project(n) => n.close(),
            ExecNode::Join(n) => n.close(),
            ExecNode::Aggregate(n) => n.close(),
            ExecNode::Insert(n) => n.close(),
            ExecNode::Delete(n) => n.close(),
        }
    }

    /// Returns the schema of the tuples this node produces.
    pub fn tuple_desc(&self) -> TupleDesc {
        match self {
            ExecNode::SeqScan(n) => n.desc.clone(),
            ExecNode::ValuesScan(n) => n.desc.clone(),
            ExecNode::Filter(n) => n.child.tuple_desc(),
            ExecNode::Project(n) => n.desc.clone(),
            ExecNode::Join(n) => n.desc.clone(),
            ExecNode::Aggregate(n) => n.desc.clone(),
            ExecNode::Insert(n) => n.desc.clone(),
            ExecNode::Delete(n) => n.desc.clone(),
        }
    }

    /// Returns the node's children, left to right.
    pub fn children(&self) -> Vec<&ExecNode> {
        match self {
            ExecNode::SeqScan(_) => vec![],
            ExecNode::ValuesScan(_) => vec![],
            ExecNode::Filter(n) => vec![&*n.child],
            ExecNode::Project(n) => vec![&*n.child],
            ExecNode::Join(n) => vec![&*n.left, &*n.right],
            ExecNode::Aggregate(n) => vec![&*n.child],
            ExecNode::Insert(n) => vec![&*n.child],
            ExecNode::Delete(n) => vec![&*n.child],
        }
    }

    /// Replaces the node's children, left to right.
    ///
    /// # Panics
    ///
    /// Panics if the number of children does not match the node's arity.
    pub fn set_children(&mut self, mut children: Vec<ExecNode>) {
        let arity = self.children().len();
        assert_eq!(
            children.len(),
            arity,
            "node takes {} children, got {}",
            arity,
            children.len()
        );
        match self {
            ExecNode::SeqScan(_) | ExecNode::ValuesScan(_) => {}
            ExecNode::Filter(n) => {
                n.child = Box::new(children.pop().expect("arity checked"));
            }
            ExecNode::Project(n) => {
                n.child = Box::new(children.pop().expect("arity checked"));
            }
            ExecNode::Join(n) => {
                n.right = Box::new(children.pop().expect("arity checked"));
                n.left = Box::new(children.pop().expect("arity checked"));
            }
            ExecNode::Aggregate(n) => {
                n.child = Box::new(children.pop().expect("arity checked"));
            }
            ExecNode::Insert(n) => {
                n.child = Box::new(children.pop().expect("arity checked"));
            }
            ExecNode::Delete(n) => {
                n.child = Box::new(children.pop().expect("arity checked"));
            }
        }
    }
}

/// Sequential scan over a table's heap file.
///
/// Pages are fetched lazily through the buffer pool inside
/// [`HeapScan`], acquiring read locks as the scan advances.
pub struct SeqScan {
    pool: Arc<BufferPool>,
    file: Arc<HeapFile>,
    tid: TransactionId,
    pub(super) desc: TupleDesc,
    scan: Option<HeapScan>,
}

impl SeqScan {
    /// Creates a scan over `table` on behalf of `tid`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Catalog` if the table is not registered.
    pub fn new(engine: &Engine, tid: TransactionId, table: TableId) -> Result<SeqScan, ExecutorError> {
        let file = engine.catalog().file(table)?;
        let desc = file.desc().clone();
        Ok(SeqScan {
            pool: Arc::clone(engine.pool()),
            file,
            tid,
            desc,
            scan: None,
        })
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        let mut scan = HeapScan::new(
            Arc::clone(&self.file),
            Arc::clone(&self.pool),
            self.tid,
        );
        scan.open();
        self.scan = Some(scan);
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        match self.scan.as_mut() {
            Some(scan) => Ok(scan.next()?),
            None => Ok(None),
        }
    }

    pub(super) fn rewind(&mut self) -> Result<(), ExecutorError> {
        if let Some(scan) = self.scan.as_mut() {
            scan.rewind();
        }
        Ok(())
    }

    pub(super) fn close(&mut self) {
        self.scan = None;
    }
}

/// Constant relation over an in-memory tuple list.
///
/// The leaf used to drive Insert (and operator tests) from literal
/// tuples rather than a stored table.
pub struct ValuesScan {
    pub(super) desc: TupleDesc,
    rows: Vec<Tuple>,
    cursor: usize,
}

impl ValuesScan {
    /// Creates a scan over the given tuples.
    pub fn new(desc: TupleDesc, rows: Vec<Tuple>) -> ValuesScan {
        ValuesScan {
            desc,
            rows,
            cursor: 0,
        }
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        self.cursor = 0;
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let tuple = self.rows[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    pub(super) fn rewind(&mut self) -> Result<(), ExecutorError> {
        self.cursor = 0;
        Ok(())
    }

    pub(super) fn close(&mut self) {}
}

/// Filter: materializes the child tuples passing a predicate at open,
/// which makes rewinds free.
pub struct Filter {
    predicate: Predicate,
    pub(super) child: Box<ExecNode>,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Filter {
    /// Creates a filter applying `predicate` to `child`'s tuples.
    pub fn new(predicate: Predicate, child: ExecNode) -> Filter {
        Filter {
            predicate,
            child: Box::new(child),
            results: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    /// Returns the filter's predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()?;
        self.results.clear();
        while let Some(tuple) = self.child.next()? {
            if self.predicate.eval(&tuple) {
                self.results.push(tuple);
            }
        }
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if !self.opened || self.cursor >= self.results.len() {
            return Ok(None);
        }
        let tuple = self.results[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    pub(super) fn rewind(&mut self) -> Result<(), ExecutorError> {
        self.cursor = 0;
        Ok(())
    }

    pub(super) fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.opened = false;
    }
}

/// Stateless per-tuple column projection.
pub struct Project {
    pub(super) child: Box<ExecNode>,
    fields: Vec<usize>,
    pub(super) desc: TupleDesc,
}

impl Project {
    /// Creates a projection keeping `fields` of the child's tuples, in
    /// the given order. `types` must name the type of each kept field.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::FieldIndex` for an out-of-range index and
    /// `ExecutorError::TypeMismatch` if a type disagrees with the child's
    /// schema.
    pub fn new(
        fields: Vec<usize>,
        types: Vec<FieldType>,
        child: ExecNode,
    ) -> Result<Project, ExecutorError> {
        let child_desc = child.tuple_desc();
        let mut columns = Vec::with_capacity(fields.len());
        for (&index, &ty) in fields.iter().zip(types.iter()) {
            if index >= child_desc.num_fields() {
                return Err(ExecutorError::FieldIndex {
                    index,
                    len: child_desc.num_fields(),
                });
            }
            if child_desc.field_type(index) != ty {
                return Err(ExecutorError::TypeMismatch {
                    expected: ty,
                    found: child_desc.field_type(index),
                });
            }
            columns.push((ty, child_desc.field_name(index).map(str::to_string)));
        }
        Ok(Project {
            child: Box::new(child),
            fields,
            desc: TupleDesc::new(columns),
        })
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let Some(tuple) = self.child.next()? else {
            return Ok(None);
        };
        let fields = self
            .fields
            .iter()
            .map(|&i| tuple.field(i).clone())
            .collect();
        Ok(Some(Tuple::new(self.desc.clone(), fields)))
    }

    pub(super) fn rewind(&mut self) -> Result<(), ExecutorError> {
        self.child.rewind()
    }

    pub(super) fn close(&mut self) {
        self.child.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Op;
    use crate::tuple::Field;

    fn values(rows: &[i32]) -> ExecNode {
        let desc = TupleDesc::from_types([FieldType::Int]);
        let tuples = rows
            .iter()
            .map(|v| Tuple::new(desc.clone(), vec![Field::Int(*v)]))
            .collect();
        ExecNode::ValuesScan(ValuesScan::new(desc, tuples))
    }

    fn drain(node: &mut ExecNode) -> Vec<i32> {
        let mut out = Vec::new();
        while let Some(tuple) = node.next().unwrap() {
            match tuple.field(0) {
                Field::Int(v) => out.push(*v),
                other => panic!("unexpected field {}", other),
            }
        }
        out
    }

    #[test]
    fn test_values_scan_contract() {
        let mut node = values(&[1, 2, 3]);
        node.open().unwrap();
        assert_eq!(drain(&mut node), vec![1, 2, 3]);
        assert!(node.next().unwrap().is_none());

        node.rewind().unwrap();
        assert_eq!(drain(&mut node), vec![1, 2, 3]);
        node.close();
    }

    #[test]
    fn test_filter_materializes_and_rewinds() {
        let mut node = ExecNode::Filter(Filter::new(
            Predicate::new(0, Op::GreaterThan, Field::Int(1)),
            values(&[1, 2, 3]),
        ));
        node.open().unwrap();
        assert_eq!(drain(&mut node), vec![2, 3]);
        node.rewind().unwrap();
        assert_eq!(drain(&mut node), vec![2, 3]);
        node.close();
    }

    #[test]
    fn test_children_and_set_children() {
        let mut node = ExecNode::Filter(Filter::new(
            Predicate::new(0, Op::LessThan, Field::Int(10)),
            values(&[1, 2, 3]),
        ));
        assert_eq!(node.children().len(), 1);

        node.set_children(vec![values(&[7, 20])]);
        node.open().unwrap();
        assert_eq!(drain(&mut node), vec![7]);
        node.close();
    }

    #[test]
    fn test_project_drops_columns() {
        let desc = TupleDesc::from_types([FieldType::Int, FieldType::Int]);
        let rows = vec![
            Tuple::new(desc.clone(), vec![Field::Int(1), Field::Int(10)]),
            Tuple::new(desc.clone(), vec![Field::Int(2), Field::Int(20)]),
        ];
        let child = ExecNode::ValuesScan(ValuesScan::new(desc, rows));
        let mut node = ExecNode::Project(
            Project::new(vec![1], vec![FieldType::Int], child).unwrap(),
        );
        node.open().unwrap();
        assert_eq!(drain(&mut node), vec![10, 20]);
        node.close();
    }

    #[test]
    fn test_project_rejects_bad_index_and_type() {
        assert!(matches!(
            Project::new(vec![3], vec![FieldType::Int], values(&[1])),
            Err(ExecutorError::FieldIndex { .. })
        ));
        assert!(matches!(
            Project::new(vec![0], vec![FieldType::String], values(&[1])),
            Err(ExecutorError::TypeMismatch { .. })
        ));
    }
}
