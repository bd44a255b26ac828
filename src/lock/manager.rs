//! Lock registry and per-transaction bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;

use super::error::LockError;
use super::page_lock::PageLock;
use crate::storage::PageId;
use crate::tx::{Permissions, TransactionId};

/// Wait timeout after which a blocked transaction is treated as
/// deadlocked and aborted.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Registry of per-page locks plus the `transaction -> locked pages` map.
///
/// Acquisition takes the page's monitor *outside* the manager's own
/// mutexes, so a blocked wait never holds up unrelated transactions'
/// bookkeeping. The bookkeeping map itself serializes a single
/// transaction's concurrent workers.
pub struct LockManager {
    timeout: Duration,
    /// Every page lock ever created, keyed by page.
    locks: Mutex<HashMap<PageId, Arc<PageLock>>>,
    /// Pages each transaction currently holds a lock on.
    held: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
}

impl LockManager {
    /// Creates a lock manager with the given deadlock timeout.
    pub fn new(timeout: Duration) -> LockManager {
        LockManager {
            timeout,
            locks: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the lock for `pid`, creating it on first touch.
    fn lock_for(&self, pid: PageId) -> Arc<PageLock> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(pid)
                .or_insert_with(|| Arc::new(PageLock::new(pid, self.timeout))),
        )
    }

    /// Acquires a lock on `pid` for `tid` with the given permission.
    ///
    /// READ permission takes the shared side, WRITE the exclusive side.
    /// May block up to the deadlock timeout.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Aborted` on timeout; the transaction must then
    /// be completed as an abort.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<(), LockError> {
        let lock = self.lock_for(pid);
        match perm {
            Permissions::ReadOnly => lock.lock_read(tid)?,
            Permissions::ReadWrite => lock.lock_write(tid)?,
        }
        self.held.lock().entry(tid).or_default().insert(pid);
        Ok(())
    }

    /// Releases whichever lock `tid` holds on `pid`, if any.
    ///
    /// Used for early release of read probes; a no-op when the
    /// transaction holds nothing on the page.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        let lock = match self.locks.lock().get(&pid) {
            Some(lock) => Arc::clone(lock),
            None => return,
        };

        let mut held = self.held.lock();
        let removed = held
            .get_mut(&tid)
            .map(|pages| pages.remove(&pid))
            .unwrap_or(false);
        if !removed {
            return;
        }
        Self::unlock_both_sides(&lock, tid);
    }

    /// Releases every lock `tid` holds and withdraws its pending requests.
    pub fn release_all(&self, tid: TransactionId) {
        let pages: Vec<PageId> = self
            .held
            .lock()
            .remove(&tid)
            .into_iter()
            .flatten()
            .collect();

        for pid in &pages {
            let lock = match self.locks.lock().get(pid) {
                Some(lock) => Arc::clone(lock),
                None => continue,
            };
            Self::unlock_both_sides(&lock, tid);
        }

        // A worker of this transaction may still have a write request
        // queued somewhere (it is about to observe its own abort); make
        // sure no request lingers to starve other transactions' readers.
        let locks: Vec<Arc<PageLock>> = self.locks.lock().values().cloned().collect();
        for lock in locks {
            lock.cancel_request(tid);
        }

        debug!("transaction {}: released {} page locks", tid, pages.len());
    }

    fn unlock_both_sides(lock: &PageLock, tid: TransactionId) {
        // An upgrading transaction holds both sides at once; drop whichever
        // sides it owns. The holder checks make the unlocks infallible.
        if lock.is_reader(tid) {
            lock.unlock_read(tid)
                .expect("reader check preceded unlock_read");
        }
        if lock.is_writer(tid) {
            lock.unlock_write(tid)
                .expect("writer check preceded unlock_write");
        }
    }

    /// Returns true if `tid` holds a lock (either side) on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.held
            .lock()
            .get(&tid)
            .map(|pages| pages.contains(&pid))
            .unwrap_or(false)
    }

    /// Returns the pages `tid` currently holds locks on.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.held
            .lock()
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}
