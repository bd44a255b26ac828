//! Heap layer errors.

use crate::storage::{PageId, StorageError};
use crate::tuple::CodecError;

/// Errors from heap page and heap file operations.
#[derive(Debug)]
pub enum HeapError {
    /// A page image was not exactly `PAGE_SIZE` bytes.
    WrongPageSize {
        /// Bytes expected (PAGE_SIZE).
        expected: usize,
        /// Bytes provided.
        actual: usize,
    },

    /// A tuple's schema does not match the page or file schema.
    SchemaMismatch,

    /// Every slot of the page is occupied.
    PageFull(PageId),

    /// The tuple carries no record id, so it cannot name a slot.
    MissingRecordId,

    /// The tuple's record id names a different page or file.
    WrongPage {
        /// Page the operation was applied to.
        page: PageId,
        /// Page named by the tuple's record id.
        record: PageId,
    },

    /// The named slot is not occupied.
    SlotEmpty {
        /// Page the slot belongs to.
        page: PageId,
        /// Slot index.
        slot: u16,
    },

    /// The named slot holds different contents than the given tuple.
    TupleMismatch {
        /// Page the slot belongs to.
        page: PageId,
        /// Slot index.
        slot: u16,
    },

    /// Tuple decoding failed while parsing a page image.
    Codec(CodecError),

    /// Underlying page I/O failed.
    Storage(StorageError),
}

impl std::fmt::Display for HeapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeapError::WrongPageSize { expected, actual } => {
                write!(f, "page image must be {} bytes, got {}", expected, actual)
            }
            HeapError::SchemaMismatch => write!(f, "tuple schema does not match"),
            HeapError::PageFull(pid) => write!(f, "page {} has no empty slots", pid),
            HeapError::MissingRecordId => write!(f, "tuple has no record id"),
            HeapError::WrongPage { page, record } => {
                write!(f, "tuple belongs to page {}, not {}", record, page)
            }
            HeapError::SlotEmpty { page, slot } => {
                write!(f, "slot {} of page {} is empty", slot, page)
            }
            HeapError::TupleMismatch { page, slot } => {
                write!(f, "slot {} of page {} holds a different tuple", slot, page)
            }
            HeapError::Codec(e) => write!(f, "{}", e),
            HeapError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Codec(e) => Some(e),
            HeapError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for HeapError {
    fn from(e: CodecError) -> Self {
        HeapError::Codec(e)
    }
}

impl From<StorageError> for HeapError {
    fn from(e: StorageError) -> Self {
        HeapError::Storage(e)
    }
}
