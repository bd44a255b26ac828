//! Buffer pool implementation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::BufferError;
use crate::catalog::Catalog;
use crate::heap::HeapPage;
use crate::lock::LockManager;
use crate::storage::{PageId, TableId};
use crate::tuple::{RecordId, Tuple};
use crate::tx::{Permissions, TransactionId};

/// Default number of frames when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 50;

/// Shared handle to a cached page.
///
/// The `RwLock` only guards the in-memory representation; logical
/// isolation between transactions comes from the page locks acquired in
/// [`BufferPool::get_page`].
pub type PageRef = Arc<RwLock<HeapPage>>;

/// One occupied frame.
struct Frame {
    pid: PageId,
    page: PageRef,
}

/// Pool tables, all guarded by a single mutex.
///
/// Lock acquisition always happens before this mutex is taken, so the
/// pool never blocks on a page lock while holding its own state.
struct PoolState {
    frames: Vec<Option<Frame>>,
    /// Maps a cached page to its frame index.
    lookup: HashMap<PageId, usize>,
    /// Unoccupied frame indexes.
    free: VecDeque<usize>,
    /// Occupied frames whose page is clean; the only eviction candidates.
    clean: HashSet<usize>,
    /// Randomness for the eviction policy.
    rng: StdRng,
}

/// Caches up to `capacity` pages and mediates all page access.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    locks: Arc<LockManager>,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Creates a pool with `capacity` frames.
    pub fn new(capacity: usize, catalog: Arc<Catalog>, locks: Arc<LockManager>) -> BufferPool {
        BufferPool {
            capacity,
            catalog,
            locks,
            state: Mutex::new(PoolState {
                frames: (0..capacity).map(|_| None).collect(),
                lookup: HashMap::new(),
                free: (0..capacity).collect(),
                clean: HashSet::new(),
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// Returns the number of frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of currently cached pages.
    pub fn cached_pages(&self) -> usize {
        self.state.lock().lookup.len()
    }

    /// Returns true if `pid` is currently cached.
    pub fn is_cached(&self, pid: PageId) -> bool {
        self.state.lock().lookup.contains_key(&pid)
    }

    /// Fetches a page, acquiring the appropriate page lock first.
    ///
    /// With a transaction, READ permission takes the shared lock and
    /// WRITE the exclusive lock; the call may block up to the deadlock
    /// timeout. Without a transaction (internal and test use) no lock is
    /// taken.
    ///
    /// A page inside its file's on-disk range is read from disk on a
    /// miss; a page past the end (freshly allocated by an uncommitted
    /// insert) materializes as a zeroed page without touching the file.
    ///
    /// # Errors
    ///
    /// - `BufferError::Lock` if the lock wait timed out (abort the transaction)
    /// - `BufferError::AllFramesDirty` if a miss found no evictable frame
    /// - `BufferError::Catalog` / `BufferError::Heap` on lookup or read failure
    pub fn get_page(
        &self,
        tid: Option<TransactionId>,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PageRef, BufferError> {
        if let Some(tid) = tid {
            self.locks.acquire(tid, pid, perm)?;
        }

        let mut state = self.state.lock();
        if let Some(&index) = state.lookup.get(&pid) {
            let frame = state.frames[index]
                .as_ref()
                .expect("lookup table points at an occupied frame");
            return Ok(Arc::clone(&frame.page));
        }

        if state.free.is_empty() {
            self.evict(&mut state)?;
        }
        let index = state.free.pop_front().expect("eviction freed a frame");

        let file = self.catalog.file(pid.table())?;
        let page = if pid.index() < file.disk_pages() {
            file.read_page(pid)?
        } else {
            HeapPage::empty(pid, file.desc().clone())
        };

        let page = Arc::new(RwLock::new(page));
        state.frames[index] = Some(Frame {
            pid,
            page: Arc::clone(&page),
        });
        state.lookup.insert(pid, index);
        state.clean.insert(index);
        Ok(page)
    }

    /// Releases the lock `tid` holds on `pid` ahead of transaction end.
    ///
    /// Intended for read-only probes that turned out not to matter (a
    /// full page during an insert scan); releasing anything else weakens
    /// two-phase locking.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release_page(tid, pid);
    }

    /// Returns true if `tid` holds a lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds_lock(tid, pid)
    }

    /// Excludes a cached page from eviction because it is about to be
    /// (or has been) modified.
    ///
    /// Under NO-STEAL a dirty frame must stay in memory until its
    /// transaction completes.
    pub fn mark_dirty(&self, pid: PageId) {
        let mut state = self.state.lock();
        let state = &mut *state;
        if let Some(&index) = state.lookup.get(&pid) {
            state.clean.remove(&index);
        }
    }

    /// Inserts a tuple into `table` on behalf of `tid`.
    ///
    /// Routes through the table's heap file, which acquires page locks
    /// via this pool.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table: TableId,
        tuple: Tuple,
    ) -> Result<RecordId, BufferError> {
        let file = self.catalog.file(table)?;
        file.insert_tuple(self, tid, tuple)
    }

    /// Deletes a tuple (named by its record id) on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), BufferError> {
        let rid = tuple
            .record_id()
            .ok_or(crate::heap::HeapError::MissingRecordId)?;
        let file = self.catalog.file(rid.page.table())?;
        file.delete_tuple(self, tid, tuple)
    }

    /// Flushes `pid` if it is cached and dirty, then marks its frame clean.
    pub fn flush_page(&self, pid: PageId) -> Result<(), BufferError> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, pid)
    }

    fn flush_locked(&self, state: &mut PoolState, pid: PageId) -> Result<(), BufferError> {
        let Some(&index) = state.lookup.get(&pid) else {
            return Ok(());
        };
        let frame = state.frames[index]
            .as_ref()
            .expect("lookup table points at an occupied frame");

        let mut page = frame.page.write();
        if page.dirtied_by().is_some() {
            let file = self.catalog.file(pid.table())?;
            file.write_page(&page)?;
            page.mark_dirty(None);
            // The flushed bytes are the new committed state; a later
            // abort must restore these, not the first-load image.
            page.set_before_image();
            debug!("flushed page {}", pid);
        }
        drop(page);
        state.clean.insert(index);
        Ok(())
    }

    /// Flushes every cached page.
    ///
    /// Breaks NO-STEAL if any cached page belongs to an in-flight
    /// transaction; meant for orderly shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<(), BufferError> {
        let mut state = self.state.lock();
        let pids: Vec<PageId> = state.lookup.keys().copied().collect();
        for pid in pids {
            self.flush_locked(&mut state, pid)?;
        }
        Ok(())
    }

    /// Flushes every page `tid` holds a lock on.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), BufferError> {
        let mut state = self.state.lock();
        for pid in self.locks.pages_locked_by(tid) {
            self.flush_locked(&mut state, pid)?;
        }
        Ok(())
    }

    /// Flushes `pid` and drops it from the pool.
    pub fn discard_page(&self, pid: PageId) -> Result<(), BufferError> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, pid)?;
        Self::forget(&mut state, pid);
        Ok(())
    }

    fn forget(state: &mut PoolState, pid: PageId) {
        if let Some(index) = state.lookup.remove(&pid) {
            state.frames[index] = None;
            state.clean.remove(&index);
            state.free.push_back(index);
        }
    }

    /// Evicts one uniformly-random clean frame.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::AllFramesDirty` if no frame is clean.
    fn evict(&self, state: &mut PoolState) -> Result<(), BufferError> {
        if state.clean.is_empty() {
            return Err(BufferError::AllFramesDirty);
        }
        let nth = state.rng.gen_range(0..state.clean.len());
        let index = *state
            .clean
            .iter()
            .nth(nth)
            .expect("clean set was checked non-empty");
        let pid = state.frames[index]
            .as_ref()
            .expect("clean frames are occupied")
            .pid;

        debug!("evicting page {}", pid);
        // Clean by construction, so the flush is a formality; it also
        // re-inserts the frame into the clean set, which forget undoes.
        self.flush_locked(state, pid)?;
        Self::forget(state, pid);
        Ok(())
    }

    /// Commits or aborts `tid`, then releases all of its locks.
    ///
    /// Commit flushes every page the transaction holds a lock on
    /// (FORCE). Abort reverts every cached dirty page of the transaction
    /// to its before-image and rolls back the page counts of files it
    /// extended.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), BufferError> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            let mut state = self.state.lock();
            let state = &mut *state;
            for pid in self.locks.pages_locked_by(tid) {
                let Some(&index) = state.lookup.get(&pid) else {
                    // Under NO-STEAL an uncached page cannot be dirty.
                    continue;
                };
                let file = self.catalog.file(pid.table())?;
                if pid.index() >= file.disk_pages() {
                    file.reset_num_pages();
                }

                let frame = state.frames[index]
                    .as_ref()
                    .expect("lookup table points at an occupied frame");
                let mut page = frame.page.write();
                if page.dirtied_by().is_some() {
                    debug!("transaction {}: reverting page {}", tid, pid);
                    *page = page.before_image();
                    drop(page);
                    state.clean.insert(index);
                }
            }
        }
        self.locks.release_all(tid);
        Ok(())
    }
}
