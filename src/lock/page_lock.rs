//! Transaction-aware read/write lock for one page.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::error::LockError;
use crate::storage::PageId;
use crate::tx::TransactionId;

/// Lock ownership state, protected by the monitor mutex.
struct LockState {
    /// Transactions holding shared access.
    readers: HashSet<TransactionId>,
    /// Transaction holding exclusive access, if any.
    writer: Option<TransactionId>,
    /// Transactions currently waiting for exclusive access. Pending write
    /// requests block new readers, so writers cannot starve.
    write_requests: HashSet<TransactionId>,
}

/// A multi-reader/single-writer lock on one page, keyed by transaction id.
///
/// Ownership is reentrant per transaction: a transaction that already has
/// the access it asks for gets it again immediately, and the holder of the
/// write lock may also read. A transaction that is the *only* reader may
/// upgrade to the write lock; its read ownership is kept alongside, so at
/// rest either `writer` is unset or `readers ⊆ {writer}` plus the readers
/// admitted before the write request.
///
/// Waiting is bounded: every acquisition races a fixed deadline, and a
/// transaction still blocked at the deadline fails with
/// [`LockError::Aborted`]. This is the engine's whole deadlock story.
pub struct PageLock {
    page: PageId,
    state: Mutex<LockState>,
    waiters: Condvar,
    timeout: Duration,
}

impl PageLock {
    /// Creates an uncontended lock for `page` with the given wait timeout.
    pub fn new(page: PageId, timeout: Duration) -> PageLock {
        PageLock {
            page,
            state: Mutex::new(LockState {
                readers: HashSet::new(),
                writer: None,
                write_requests: HashSet::new(),
            }),
            waiters: Condvar::new(),
            timeout,
        }
    }

    /// Returns the page this lock guards.
    pub fn page(&self) -> PageId {
        self.page
    }

    fn can_grant_read(state: &LockState, tid: TransactionId) -> bool {
        match state.writer {
            Some(writer) => writer == tid,
            None => state.readers.contains(&tid) || state.write_requests.is_empty(),
        }
    }

    fn can_grant_write(state: &LockState, tid: TransactionId) -> bool {
        let other_readers = state.readers.iter().any(|r| *r != tid);
        let other_writer = state.writer.is_some() && state.writer != Some(tid);
        !other_readers && !other_writer
    }

    /// Waits on the monitor until `granted` holds or the deadline passes.
    ///
    /// Re-checks the predicate across spurious wakeups against an absolute
    /// deadline, so the total wait never exceeds the configured timeout.
    fn wait_for(
        &self,
        state: &mut MutexGuard<'_, LockState>,
        tid: TransactionId,
        granted: fn(&LockState, TransactionId) -> bool,
    ) -> bool {
        let deadline = Instant::now() + self.timeout;
        while !granted(state, tid) {
            if self.waiters.wait_until(state, deadline).timed_out() {
                return granted(state, tid);
            }
        }
        true
    }

    /// Acquires shared access for `tid`, blocking up to the timeout.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Aborted` if the timeout elapses first.
    pub fn lock_read(&self, tid: TransactionId) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if state.writer == Some(tid) || state.readers.contains(&tid) {
            return Ok(());
        }

        if !self.wait_for(&mut state, tid, Self::can_grant_read) {
            debug!("transaction {} timed out reading page {}", tid, self.page);
            return Err(LockError::Aborted {
                tid,
                page: self.page,
            });
        }
        state.readers.insert(tid);
        Ok(())
    }

    /// Acquires exclusive access for `tid`, blocking up to the timeout.
    ///
    /// A transaction whose only competition is its own read lock upgrades
    /// in place. While waiting, the request is registered so that new
    /// readers queue behind it.
    ///
    /// # Errors
    ///
    /// Returns `LockError::Aborted` if the timeout elapses first; the
    /// pending write request is withdrawn before returning.
    pub fn lock_write(&self, tid: TransactionId) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if state.writer == Some(tid) {
            return Ok(());
        }

        state.write_requests.insert(tid);
        if !self.wait_for(&mut state, tid, Self::can_grant_write) {
            state.write_requests.remove(&tid);
            // Readers held out only by this request can now proceed.
            self.waiters.notify_all();
            debug!("transaction {} timed out writing page {}", tid, self.page);
            return Err(LockError::Aborted {
                tid,
                page: self.page,
            });
        }
        state.write_requests.remove(&tid);
        state.writer = Some(tid);
        Ok(())
    }

    /// Releases `tid`'s shared access.
    ///
    /// # Errors
    ///
    /// Returns `LockError::NotHeld` if `tid` is not a reader.
    pub fn unlock_read(&self, tid: TransactionId) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if !state.readers.remove(&tid) {
            return Err(LockError::NotHeld {
                tid,
                page: self.page,
            });
        }
        self.waiters.notify_all();
        Ok(())
    }

    /// Releases `tid`'s exclusive access.
    ///
    /// # Errors
    ///
    /// Returns `LockError::NotHeld` if `tid` is not the writer.
    pub fn unlock_write(&self, tid: TransactionId) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if state.writer != Some(tid) {
            return Err(LockError::NotHeld {
                tid,
                page: self.page,
            });
        }
        state.writer = None;
        self.waiters.notify_all();
        Ok(())
    }

    /// Withdraws any pending write request by `tid` and wakes waiters.
    pub fn cancel_request(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        if state.write_requests.remove(&tid) {
            self.waiters.notify_all();
        }
    }

    /// Returns true if `tid` holds shared access.
    pub fn is_reader(&self, tid: TransactionId) -> bool {
        self.state.lock().readers.contains(&tid)
    }

    /// Returns true if `tid` holds exclusive access.
    pub fn is_writer(&self, tid: TransactionId) -> bool {
        self.state.lock().writer == Some(tid)
    }
}
