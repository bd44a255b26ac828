//! Grouped aggregation.
//!
//! [`Aggregate`] is the operator node; it dispatches on the aggregated
//! field's type to [`IntegerAggregator`] or [`StringAggregator`], which
//! hold the running per-group state and are drained into result tuples
//! when the node opens.

use std::collections::HashMap;
use std::fmt;

use super::error::ExecutorError;
use super::node::ExecNode;
use crate::tuple::{Field, FieldType, Tuple, TupleDesc};

/// Supported aggregate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Avg => "avg",
        };
        write!(f, "{}", s)
    }
}

/// Running state for one group of integer values.
trait Accumulator {
    /// Folds one value into the state.
    fn feed(&mut self, value: i32);
    /// Produces the aggregate result.
    fn finish(&self) -> i32;
}

struct CountAcc {
    count: i64,
}

impl Accumulator for CountAcc {
    fn feed(&mut self, _value: i32) {
        self.count += 1;
    }

    fn finish(&self) -> i32 {
        self.count as i32
    }
}

struct SumAcc {
    sum: i64,
}

impl Accumulator for SumAcc {
    fn feed(&mut self, value: i32) {
        self.sum += value as i64;
    }

    fn finish(&self) -> i32 {
        self.sum as i32
    }
}

struct MinAcc {
    min: i32,
}

impl Accumulator for MinAcc {
    fn feed(&mut self, value: i32) {
        self.min = self.min.min(value);
    }

    fn finish(&self) -> i32 {
        self.min
    }
}

struct MaxAcc {
    max: i32,
}

impl Accumulator for MaxAcc {
    fn feed(&mut self, value: i32) {
        self.max = self.max.max(value);
    }

    fn finish(&self) -> i32 {
        self.max
    }
}

/// AVG keeps `(count, sum)` and emits the integer quotient.
struct AvgAcc {
    count: i64,
    sum: i64,
}

impl Accumulator for AvgAcc {
    fn feed(&mut self, value: i32) {
        self.count += 1;
        self.sum += value as i64;
    }

    fn finish(&self) -> i32 {
        if self.count == 0 {
            0
        } else {
            (self.sum / self.count) as i32
        }
    }
}

fn make_accumulator(op: AggregateOp) -> Box<dyn Accumulator> {
    match op {
        AggregateOp::Count => Box::new(CountAcc { count: 0 }),
        AggregateOp::Sum => Box::new(SumAcc { sum: 0 }),
        AggregateOp::Min => Box::new(MinAcc { min: i32::MAX }),
        AggregateOp::Max => Box::new(MaxAcc { max: i32::MIN }),
        AggregateOp::Avg => Box::new(AvgAcc { count: 0, sum: 0 }),
    }
}

/// Computes one aggregate over INT fields, optionally grouped.
///
/// Accumulators are created lazily on the first tuple of each group, so
/// an empty input yields no output rows at all (rather than a zero row).
pub struct IntegerAggregator {
    group_by: Option<(usize, FieldType)>,
    field: usize,
    op: AggregateOp,
    groups: HashMap<Field, Box<dyn Accumulator>>,
    no_group: Option<Box<dyn Accumulator>>,
}

impl IntegerAggregator {
    /// Creates an aggregator for `op` over field `field`, grouped by the
    /// field described by `group_by` when present.
    pub fn new(group_by: Option<(usize, FieldType)>, field: usize, op: AggregateOp) -> IntegerAggregator {
        IntegerAggregator {
            group_by,
            field,
            op,
            groups: HashMap::new(),
            no_group: None,
        }
    }

    /// Folds one tuple into the aggregate.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::TypeMismatch` if the aggregated field is
    /// not an INT.
    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutorError> {
        let value = match tuple.field(self.field) {
            Field::Int(v) => *v,
            other => {
                return Err(ExecutorError::TypeMismatch {
                    expected: FieldType::Int,
                    found: other.field_type(),
                });
            }
        };

        let op = self.op;
        match self.group_by {
            None => self
                .no_group
                .get_or_insert_with(|| make_accumulator(op))
                .feed(value),
            Some((group_field, _)) => self
                .groups
                .entry(tuple.field(group_field).clone())
                .or_insert_with(|| make_accumulator(op))
                .feed(value),
        }
        Ok(())
    }

    /// Drains the aggregate into `(schema, rows)`.
    ///
    /// Without grouping the schema is a single INT column and at most one
    /// row is produced; with grouping it is `(group type, INT)` with one
    /// row per group, in no particular order.
    pub fn results(&self) -> (TupleDesc, Vec<Tuple>) {
        match self.group_by {
            None => {
                let desc = TupleDesc::from_types([FieldType::Int]);
                let rows = self
                    .no_group
                    .iter()
                    .map(|acc| Tuple::new(desc.clone(), vec![Field::Int(acc.finish())]))
                    .collect();
                (desc, rows)
            }
            Some((_, group_type)) => {
                let desc = TupleDesc::from_types([group_type, FieldType::Int]);
                let rows = self
                    .groups
                    .iter()
                    .map(|(key, acc)| {
                        Tuple::new(desc.clone(), vec![key.clone(), Field::Int(acc.finish())])
                    })
                    .collect();
                (desc, rows)
            }
        }
    }
}

/// Counts STRING fields, optionally grouped. COUNT is the only aggregate
/// defined for strings; any other op is rejected at construction.
pub struct StringAggregator {
    group_by: Option<(usize, FieldType)>,
    field: usize,
    groups: HashMap<Field, i64>,
    no_group: i64,
}

impl StringAggregator {
    /// Creates a COUNT aggregator over field `field`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::UnsupportedAggregate` for any op other
    /// than COUNT.
    pub fn new(
        group_by: Option<(usize, FieldType)>,
        field: usize,
        op: AggregateOp,
    ) -> Result<StringAggregator, ExecutorError> {
        if op != AggregateOp::Count {
            return Err(ExecutorError::UnsupportedAggregate {
                op,
                ty: FieldType::String,
            });
        }
        Ok(StringAggregator {
            group_by,
            field,
            groups: HashMap::new(),
            no_group: 0,
        })
    }

    /// Folds one tuple into the count.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::TypeMismatch` if the counted field is not
    /// a STRING.
    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutorError> {
        if tuple.field(self.field).field_type() != FieldType::String {
            return Err(ExecutorError::TypeMismatch {
                expected: FieldType::String,
                found: tuple.field(self.field).field_type(),
            });
        }
        match self.group_by {
            None => self.no_group += 1,
            Some((group_field, _)) => {
                *self
                    .groups
                    .entry(tuple.field(group_field).clone())
                    .or_insert(0) += 1;
            }
        }
        Ok(())
    }

    /// Drains the count into `(schema, rows)`.
    ///
    /// Consistent with [`IntegerAggregator`], an ungrouped count over
    /// empty input emits nothing.
    pub fn results(&self) -> (TupleDesc, Vec<Tuple>) {
        match self.group_by {
            None => {
                let desc = TupleDesc::from_types([FieldType::Int]);
                let rows = if self.no_group > 0 {
                    vec![Tuple::new(
                        desc.clone(),
                        vec![Field::Int(self.no_group as i32)],
                    )]
                } else {
                    Vec::new()
                };
                (desc, rows)
            }
            Some((_, group_type)) => {
                let desc = TupleDesc::from_types([group_type, FieldType::Int]);
                let rows = self
                    .groups
                    .iter()
                    .map(|(key, count)| {
                        Tuple::new(desc.clone(), vec![key.clone(), Field::Int(*count as i32)])
                    })
                    .collect();
                (desc, rows)
            }
        }
    }
}

/// Per-field-type aggregator dispatch.
enum Aggregator {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

impl Aggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutorError> {
        match self {
            Aggregator::Int(a) => a.merge(tuple),
            Aggregator::Str(a) => a.merge(tuple),
        }
    }

    fn results(&self) -> (TupleDesc, Vec<Tuple>) {
        match self {
            Aggregator::Int(a) => a.results(),
            Aggregator::Str(a) => a.results(),
        }
    }
}

/// Aggregation operator node.
///
/// Drains its child at open, folding every tuple into the aggregator,
/// then iterates the per-group results. Output schema is `(INT)` without
/// grouping and `(group type, INT)` with grouping.
pub struct Aggregate {
    pub(super) child: Box<ExecNode>,
    field: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    pub(super) desc: TupleDesc,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Aggregate {
    /// Creates an aggregation of `op` over `field` of `child`'s tuples,
    /// grouped by `group_by` when present.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::FieldIndex` if an index is out of range
    /// - `ExecutorError::UnsupportedAggregate` if `field` is a STRING
    ///   column and `op` is not COUNT
    pub fn new(
        child: ExecNode,
        field: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Aggregate, ExecutorError> {
        let child_desc = child.tuple_desc();
        for index in std::iter::once(field).chain(group_by) {
            if index >= child_desc.num_fields() {
                return Err(ExecutorError::FieldIndex {
                    index,
                    len: child_desc.num_fields(),
                });
            }
        }
        if child_desc.field_type(field) == FieldType::String && op != AggregateOp::Count {
            return Err(ExecutorError::UnsupportedAggregate {
                op,
                ty: FieldType::String,
            });
        }

        let agg_name = format!(
            "{}({})",
            op,
            child_desc.field_name(field).unwrap_or("?")
        );
        let desc = match group_by {
            None => TupleDesc::new(vec![(FieldType::Int, Some(agg_name))]),
            Some(g) => TupleDesc::new(vec![
                (
                    child_desc.field_type(g),
                    child_desc.field_name(g).map(str::to_string),
                ),
                (FieldType::Int, Some(agg_name)),
            ]),
        };

        Ok(Aggregate {
            child: Box::new(child),
            field,
            group_by,
            op,
            desc,
            results: Vec::new(),
            cursor: 0,
            opened: false,
        })
    }

    fn build_aggregator(&self) -> Result<Aggregator, ExecutorError> {
        let child_desc = self.child.tuple_desc();
        let group_by = self
            .group_by
            .map(|g| (g, child_desc.field_type(g)));
        Ok(match child_desc.field_type(self.field) {
            FieldType::Int => {
                Aggregator::Int(IntegerAggregator::new(group_by, self.field, self.op))
            }
            FieldType::String => {
                Aggregator::Str(StringAggregator::new(group_by, self.field, self.op)?)
            }
        })
    }

    pub(super) fn open(&mut self) -> Result<(), ExecutorError> {
        let mut aggregator = self.build_aggregator()?;
        self.child.open()?;
        while let Some(tuple) = self.child.next()? {
            aggregator.merge(&tuple)?;
        }
        let (_, rows) = aggregator.results();
        self.results = rows;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        if !self.opened || self.cursor >= self.results.len() {
            return Ok(None);
        }
        // Re-stamp the descriptor so emitted tuples carry the node's
        // column names rather than the aggregator's bare types.
        let tuple = Tuple::new(self.desc.clone(), self.results[self.cursor].fields().to_vec());
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
