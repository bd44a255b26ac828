//! Executor errors.

use super::aggregate::AggregateOp;
use crate::buffer::BufferError;
use crate::catalog::CatalogError;
use crate::tuple::FieldType;

/// Errors from building or running an operator tree.
#[derive(Debug)]
pub enum ExecutorError {
    /// A field index exceeds the schema's field count.
    FieldIndex {
        /// Index that was requested.
        index: usize,
        /// Number of fields in the schema.
        len: usize,
    },

    /// A field had a different type than the operator requires.
    TypeMismatch {
        /// Type the operator requires.
        expected: FieldType,
        /// Type actually found.
        found: FieldType,
    },

    /// The aggregate operation is not defined for the field's type.
    UnsupportedAggregate {
        /// Requested aggregate operation.
        op: AggregateOp,
        /// Type of the aggregated field.
        ty: FieldType,
    },

    /// A child operator's schema does not match the target table.
    SchemaMismatch,

    /// Catalog lookup failed.
    Catalog(CatalogError),

    /// Page access failed (including lock-timeout aborts).
    Buffer(BufferError),
}

impl ExecutorError {
    /// Returns true if this error means the transaction must abort
    /// because a lock wait timed out.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ExecutorError::Buffer(e) if e.is_aborted())
    }
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::FieldIndex { index, len } => {
                write!(f, "field index {} out of range for {} fields", index, len)
            }
            ExecutorError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            ExecutorError::UnsupportedAggregate { op, ty } => {
                write!(f, "aggregate {} is not defined for {} fields", op, ty)
            }
            ExecutorError::SchemaMismatch => {
                write!(f, "child schema does not match the target table")
            }
            ExecutorError::Catalog(e) => write!(f, "{}", e),
            ExecutorError::Buffer(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Catalog(e) => Some(e),
            ExecutorError::Buffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for ExecutorError {
    fn from(e: CatalogError) -> Self {
        ExecutorError::Catalog(e)
    }
}

impl From<BufferError> for ExecutorError {
    fn from(e: BufferError) -> Self {
        ExecutorError::Buffer(e)
    }
}
