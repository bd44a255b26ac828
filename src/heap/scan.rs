//! Restartable tuple stream over a heap file.

use std::sync::Arc;

use super::file::HeapFile;
use crate::buffer::{BufferError, BufferPool};
use crate::storage::PageId;
use crate::tuple::Tuple;
use crate::tx::{Permissions, TransactionId};

/// Lazy tuple stream over all pages of a heap file, in page order and
/// slot order.
///
/// Pages are pulled through the buffer pool one at a time with READ
/// permission, so the stream participates in two-phase locking like any
/// other reader; the current page's tuples are buffered so no page latch
/// is held between [`next`](Self::next) calls.
pub struct HeapScan {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    next_page: u32,
    buffer: std::vec::IntoIter<Tuple>,
    open: bool,
}

impl HeapScan {
    /// Creates a scan over `file` on behalf of `tid`.
    ///
    /// The scan starts closed; call [`open`](Self::open) first.
    pub fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapScan {
        HeapScan {
            file,
            pool,
            tid,
            next_page: 0,
            buffer: Vec::new().into_iter(),
            open: false,
        }
    }

    /// Opens (or reopens) the scan at the first page.
    pub fn open(&mut self) {
        self.open = true;
        self.next_page = 0;
        self.buffer = Vec::new().into_iter();
    }

    /// Returns the next tuple, or `None` when the file is exhausted or the
    /// scan is closed.
    ///
    /// # Errors
    ///
    /// Propagates lock timeouts and pool errors from page fetches.
    pub fn next(&mut self) -> Result<Option<Tuple>, BufferError> {
        if !self.open {
            return Ok(None);
        }
        loop {
            if let Some(tuple) = self.buffer.next() {
                return Ok(Some(tuple));
            }
            if self.next_page >= self.file.num_pages() {
                return Ok(None);
            }
            let pid = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;

            let page = self
                .pool
                .get_page(Some(self.tid), pid, Permissions::ReadOnly)?;
            let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
            self.buffer = tuples.into_iter();
        }
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) {
        if self.open {
            self.next_page = 0;
            self.buffer = Vec::new().into_iter();
        }
    }

    /// Closes the scan; subsequent [`next`](Self::next) calls return `None`.
    pub fn close(&mut self) {
        self.open = false;
        self.buffer = Vec::new().into_iter();
    }
}
