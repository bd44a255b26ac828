//! Insert and delete operator nodes.

use std::sync::Arc;

use super::error::ExecutorError;
use super::node::ExecNode;
use crate::buffer::BufferPool;
use crate::engine::Engine;
use crate::storage::TableId;
use crate::tuple::{Field, FieldType, Tuple, TupleDesc};
use crate::tx::TransactionId;

fn count_desc() -> TupleDesc {
    TupleDesc::new(vec![(FieldType::Int, Some("count".to_string()))])
}

/// Drains its child into a table and emits a single one-field tuple
/// holding the number of rows inserted.
///
/// All the work happens on the first `next` call; subsequent calls
/// return `None` until the node is rewound or reopened.
pub struct Insert {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    table: TableId,
    pub(super) child: Box<ExecNode>,
    pub(super) desc: TupleDesc,
    done: bool,
}

impl Insert {
    /// Creates an insert of `child`'s tuples into `table` on behalf of
    /// `tid`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::SchemaMismatch` if the child's schema does
    /// not match the table's.
    pub fn new(
        engine: &Engine,
        tid: TransactionId,
        child: ExecNode,
        table: TableId,
    ) -> Result<Insert, ExecutorError> {
        let table_desc = engine.catalog().tuple_desc(table)?;
        if child.tuple_desc() != table_desc {
            return Err(ExecutorError::SchemaMismatch);
        }
        Ok(Insert {
            pool: Arc::clone(engine.pool()),
            tid,
            table,
            child: Box::new(child),
            desc: count_desc(),
            done: false,
        })
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if self.done {
            return Ok(None);
        }
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.pool.insert_tuple(self.tid, self.table, tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])))
    }

    pub(super) fn rewind(&mut self) -> Result<(), ExecutorError> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    pub(super) fn close(&mut self) {
        self.child.close();
        self.done = true;
    }
}

/// Drains its child deleting every tuple (each must carry the record id
/// of the heap slot it came from) and emits a single one-field tuple
/// holding the number of rows deleted.
pub struct Delete {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    pub(super) child: Box<ExecNode>,
    pub(super) desc: TupleDesc,
    done: bool,
}

impl Delete {
    /// Creates a delete of `child`'s tuples on behalf of `tid`.
    pub fn new(engine: &Engine, tid: TransactionId, child: ExecNode) -> Delete {
        Delete {
            pool: Arc::clone(engine.pool()),
            tid,
            child: Box::new(child),
            desc: count_desc(),
            done: false,
        }
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if self.done {
            return Ok(None);
        }
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.pool.delete_tuple(self.tid, &tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])))
    }

    pub(super) fn rewind(&mut self) -> Result<(), ExecutorError> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    pub(super) fn close(&mut self) {
        self.child.close();
        self.done = true;
    }
}
