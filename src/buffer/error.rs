//! Buffer pool errors.

use crate::catalog::CatalogError;
use crate::heap::HeapError;
use crate::lock::LockError;

/// Errors from buffer pool operations.
#[derive(Debug)]
pub enum BufferError {
    /// Every frame holds a dirty page, so nothing can be evicted under
    /// NO-STEAL. Usually resolved by aborting the requesting transaction.
    AllFramesDirty,

    /// Lock acquisition failed; `LockError::Aborted` is the deadlock
    /// timeout surfacing to the caller.
    Lock(LockError),

    /// Page read, parse, or tuple operation failed.
    Heap(HeapError),

    /// The page's table is not registered in the catalog.
    Catalog(CatalogError),
}

impl BufferError {
    /// Returns true if this error means the transaction must abort
    /// because a lock wait timed out.
    pub fn is_aborted(&self) -> bool {
        matches!(self, BufferError::Lock(LockError::Aborted { .. }))
    }
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::AllFramesDirty => {
                write!(f, "all pages in the buffer pool are dirty")
            }
            BufferError::Lock(e) => write!(f, "{}", e),
            BufferError::Heap(e) => write!(f, "{}", e),
            BufferError::Catalog(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Lock(e) => Some(e),
            BufferError::Heap(e) => Some(e),
            BufferError::Catalog(e) => Some(e),
            BufferError::AllFramesDirty => None,
        }
    }
}

impl From<LockError> for BufferError {
    fn from(e: LockError) -> Self {
        BufferError::Lock(e)
    }
}

impl From<HeapError> for BufferError {
    fn from(e: HeapError) -> Self {
        BufferError::Heap(e)
    }
}

impl From<CatalogError> for BufferError {
    fn from(e: CatalogError) -> Self {
        BufferError::Catalog(e)
    }
}
