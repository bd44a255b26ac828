//! Relational join.

use std::cmp::Ordering;

use super::error::ExecutorError;
use super::node::ExecNode;
use super::predicate::{JoinPredicate, Op};
use crate::tuple::{Tuple, TupleDesc};

/// Joins two children on a field predicate.
///
/// Equality predicates run a sort-merge join: both sides are materialized
/// and sorted on the join field at open, then merged with an equal-range
/// walk that resets the right cursor for every left tuple of the same
/// key. Ties keep their pre-sort relative order (the sort is stable).
/// Any other predicate falls back to a nested-loop join, rewinding the
/// right child between left tuples.
///
/// Output tuples are the plain concatenation of the matching pair, so an
/// equality join carries the join column twice; projecting one copy away
/// is the caller's business.
pub struct Join {
    predicate: JoinPredicate,
    pub(super) left: Box<ExecNode>,
    pub(super) right: Box<ExecNode>,
    pub(super) desc: TupleDesc,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Join {
    /// Creates a join of `left` and `right` on `predicate`.
    pub fn new(predicate: JoinPredicate, left: ExecNode, right: ExecNode) -> Join {
        let desc = TupleDesc::merge(&left.tuple_desc(), &right.tuple_desc());
        Join {
            predicate,
            left: Box::new(left),
            right: Box::new(right),
            desc,
            results: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    /// Returns the join predicate.
    pub fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        self.left.open()?;
        self.right.open()?;
        self.results.clear();
        self.cursor = 0;

        if self.predicate.op() == Op::Equals {
            self.sort_merge()?;
        } else {
            self.nested_loop()?;
        }
        self.opened = true;
        Ok(())
    }

    fn sort_merge(&mut self) -> Result<(), ExecutorError> {
        let f1 = self.predicate.field1();
        let f2 = self.predicate.field2();

        let mut left_rows = Vec::new();
        while let Some(tuple) = self.left.next()? {
            left_rows.push(tuple);
        }
        let mut right_rows = Vec::new();
        while let Some(tuple) = self.right.next()? {
            right_rows.push(tuple);
        }

        left_rows.sort_by(|a, b| {
            a.field(f1)
                .partial_cmp(b.field(f1))
                .unwrap_or(Ordering::Equal)
        });
        right_rows.sort_by(|a, b| {
            a.field(f2)
                .partial_cmp(b.field(f2))
                .unwrap_or(Ordering::Equal)
        });

        let mut i = 0;
        let mut j = 0;
        while i < left_rows.len() && j < right_rows.len() {
            let key = left_rows[i].field(f1);
            match key.partial_cmp(right_rows[j].field(f2)) {
                Some(Ordering::Less) | None => i += 1,
                Some(Ordering::Greater) => j += 1,
                Some(Ordering::Equal) => {
                    // Emit the whole equal range on the right, then step
                    // the left side and replay the range.
                    let backup_j = j;
                    while j < right_rows.len() && right_rows[j].field(f2) == key {
                        self.results.push(Tuple::concat(
                            self.desc.clone(),
                            &left_rows[i],
                            &right_rows[j],
                        ));
                        j += 1;
                    }
                    i += 1;
                    j = backup_j;
                }
            }
        }
        Ok(())
    }

    fn nested_loop(&mut self) -> Result<(), ExecutorError> {
        while let Some(left) = self.left.next()? {
            while let Some(right) = self.right.next()? {
                if self.predicate.eval(&left, &right) {
                    self.results
                        .push(Tuple::concat(self.desc.clone(), &left, &right));
                }
            }
            self.right.rewind()?;
        }
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
        self.left.close();
        self.right.close();
        self.results.clear();
        self.opened = false;
    }
}
