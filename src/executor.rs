//! Pull-based query operators.
//!
//! A query is a tree of [`ExecNode`]s; each node pulls tuples from its
//! children through the Volcano-style contract `open` / `next` / `rewind`
//! / `close`. `next` returns `Ok(None)` when the node is exhausted,
//! fusing the hasNext/next pair of the classic formulation. `open` may be
//! expensive (materialization, sorting); `close` releases per-iteration
//! state but leaves the node reusable.
//!
//! Nodes use enum dispatch rather than `dyn Trait`: the set of operators
//! is small and fixed, and it keeps child rewiring
//! ([`ExecNode::set_children`]) trivial.

mod aggregate;
mod dml;
mod error;
mod join;
mod node;
mod predicate;

pub use aggregate::{Aggregate, AggregateOp, IntegerAggregator, StringAggregator};
pub use dml::{Delete, Insert};
pub use error::ExecutorError;
pub use join::Join;
pub use node::{ExecNode, Filter, Project, SeqScan, ValuesScan};
pub use predicate::{JoinPredicate, Op, Predicate};
