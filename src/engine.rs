//! Engine wiring: catalog, lock manager, and buffer pool as one value.
//!
//! There is no process-wide singleton; an [`Engine`] is constructed
//! explicitly and threaded (behind an `Arc`) through operators and tests.
//! Tests that need isolation simply build their own engine.

use std::sync::Arc;
use std::time::Duration;

use crate::buffer::{BufferError, BufferPool, DEFAULT_CAPACITY};
use crate::catalog::Catalog;
use crate::lock::{LockManager, DEFAULT_TIMEOUT};
use crate::tx::TransactionId;

/// The assembled storage engine.
pub struct Engine {
    catalog: Arc<Catalog>,
    locks: Arc<LockManager>,
    pool: Arc<BufferPool>,
}

impl Engine {
    /// Creates an engine with the default pool capacity and lock timeout.
    pub fn new() -> Arc<Engine> {
        Engine::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an engine with `capacity` buffer frames.
    pub fn with_capacity(capacity: usize) -> Arc<Engine> {
        Engine::with_capacity_and_timeout(capacity, DEFAULT_TIMEOUT)
    }

    /// Creates an engine with `capacity` buffer frames and the given
    /// deadlock timeout. Tests use short timeouts to keep deadlock
    /// scenarios fast.
    pub fn with_capacity_and_timeout(capacity: usize, timeout: Duration) -> Arc<Engine> {
        let catalog = Arc::new(Catalog::new());
        let locks = Arc::new(LockManager::new(timeout));
        let pool = Arc::new(BufferPool::new(
            capacity,
            Arc::clone(&catalog),
            Arc::clone(&locks),
        ));
        Arc::new(Engine {
            catalog,
            locks,
            pool,
        })
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the lock manager.
    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Returns the buffer pool.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> TransactionId {
        TransactionId::new()
    }

    /// Commits `tid`: flushes its pages (FORCE) and releases its locks.
    pub fn commit(&self, tid: TransactionId) -> Result<(), BufferError> {
        self.pool.transaction_complete(tid, true)
    }

    /// Aborts `tid`: reverts its dirty pages and releases its locks.
    pub fn abort(&self, tid: TransactionId) -> Result<(), BufferError> {
        self.pool.transaction_complete(tid, false)
    }
}
