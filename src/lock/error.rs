//! Locking errors.

use crate::storage::PageId;
use crate::tx::TransactionId;

/// Errors from lock acquisition and release.
#[derive(Debug)]
pub enum LockError {
    /// The transaction waited out the deadlock timeout and must abort.
    Aborted {
        /// Transaction that timed out.
        tid: TransactionId,
        /// Page whose lock was being waited on.
        page: PageId,
    },

    /// An unlock was attempted by a transaction that does not hold the
    /// lock. This indicates a bug in the caller, not a recoverable
    /// condition.
    NotHeld {
        /// Transaction that attempted the unlock.
        tid: TransactionId,
        /// Page whose lock was (not) held.
        page: PageId,
    },
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Aborted { tid, page } => {
                write!(f, "transaction {} aborted waiting for page {}", tid, page)
            }
            LockError::NotHeld { tid, page } => {
                write!(f, "transaction {} does not hold a lock on page {}", tid, page)
            }
        }
    }
}

impl std::error::Error for LockError {}
