//! Comparison predicates over tuple fields.

use std::cmp::Ordering;
use std::fmt;

use crate::tuple::{Field, Tuple};

/// Comparison operator.
///
/// `Like` is substring containment on strings and plain equality on
/// integers. Fields of different types never compare as true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    Like,
    NotEquals,
}

impl Op {
    /// Applies the operator to two field values.
    pub fn apply(&self, lhs: &Field, rhs: &Field) -> bool {
        if let (Op::Like, Field::String(a), Field::String(b)) = (self, lhs, rhs) {
            return a.contains(b.as_str());
        }
        let Some(ord) = lhs.partial_cmp(rhs) else {
            return false;
        };
        match self {
            Op::Equals | Op::Like => ord == Ordering::Equal,
            Op::NotEquals => ord != Ordering::Equal,
            Op::GreaterThan => ord == Ordering::Greater,
            Op::GreaterThanOrEq => ord != Ordering::Less,
            Op::LessThan => ord == Ordering::Less,
            Op::LessThanOrEq => ord != Ordering::Greater,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "like",
            Op::NotEquals => "<>",
        };
        write!(f, "{}", s)
    }
}

/// Compares one tuple field against a constant.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    /// Creates a predicate `tuple[field] op operand`.
    pub fn new(field: usize, op: Op, operand: Field) -> Predicate {
        Predicate { field, op, operand }
    }

    /// Returns the field index being compared.
    pub fn field(&self) -> usize {
        self.field
    }

    /// Returns the operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// Returns the constant operand.
    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Evaluates the predicate against a tuple.
    pub fn eval(&self, tuple: &Tuple) -> bool {
        self.op.apply(tuple.field(self.field), &self.operand)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field[{}] {} {}", self.field, self.op, self.operand)
    }
}

/// Compares a field of a left tuple against a field of a right tuple.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    field1: usize,
    op: Op,
    field2: usize,
}

impl JoinPredicate {
    /// Creates a predicate `left[field1] op right[field2]`.
    pub fn new(field1: usize, op: Op, field2: usize) -> JoinPredicate {
        JoinPredicate { field1, op, field2 }
    }

    /// Returns the left tuple's field index.
    pub fn field1(&self) -> usize {
        self.field1
    }

    /// Returns the right tuple's field index.
    pub fn field2(&self) -> usize {
        self.field2
    }

    /// Returns the operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// Evaluates the predicate against a pair of tuples.
    pub fn eval(&self, left: &Tuple, right: &Tuple) -> bool {
        self.op.apply(left.field(self.field1), right.field(self.field2))
    }
}
