//! Transaction identities and access permissions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh transaction ids, shared process-wide.
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Monotonically allocated transaction identifier.
///
/// A fresh id is handed out for every [`TransactionId::new`] call; ids are
/// never reused within a process. The id is the key under which the lock
/// manager and buffer pool track a transaction's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocates a fresh transaction id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access permission requested when fetching a page through the buffer pool.
///
/// `ReadOnly` acquires a shared page lock, `ReadWrite` an exclusive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    /// Shared access; the page will not be modified.
    ReadOnly,
    /// Exclusive access; the page may be modified.
    ReadWrite,
}
