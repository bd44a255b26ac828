//! Page-granular two-phase locking.
//!
//! Every page ever touched under a transaction gets a [`PageLock`], a
//! multi-reader/single-writer monitor keyed by transaction id rather than
//! by thread. The [`LockManager`] owns the `page -> lock` registry and the
//! `transaction -> pages` bookkeeping used at commit and abort.
//!
//! Deadlocks are not detected; they are resolved by timeout. A transaction
//! that has waited out the configured timeout on any one lock fails with
//! [`LockError::Aborted`], which its driver must propagate by completing
//! the transaction as an abort.

mod error;
mod manager;
mod page_lock;

pub use error::LockError;
pub use manager::{LockManager, DEFAULT_TIMEOUT};
pub use page_lock::PageLock;
