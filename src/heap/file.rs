//! Heap file: a table's backing store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use log::trace;
use parking_lot::Mutex;

use super::error::HeapError;
use super::page::HeapPage;
use crate::buffer::BufferPool;
use crate::storage::{PageFile, PageId, TableId};
use crate::tuple::{RecordId, Tuple, TupleDesc};
use crate::tx::{Permissions, TransactionId};

/// A table's on-disk storage: an unordered collection of tuples spread
/// across slotted pages.
///
/// The page count visible through [`num_pages`](Self::num_pages) is cached
/// in memory and may run ahead of the on-disk count: a transaction that
/// appends a page sees it immediately, but under NO-STEAL the page does
/// not reach disk until that transaction commits.
/// [`reset_num_pages`](Self::reset_num_pages) rolls the cache back to the
/// on-disk count when such a transaction aborts.
pub struct HeapFile {
    id: TableId,
    desc: TupleDesc,
    file: PageFile,
    /// Cached page count; >= the on-disk count.
    pages: Mutex<u32>,
}

impl HeapFile {
    /// Opens or creates the heap file at `path` with the given schema.
    ///
    /// The table id is derived from the canonicalized path, so the same
    /// file always yields the same id.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::Storage` if the file cannot be opened or has an
    /// invalid length.
    pub fn open(path: impl Into<PathBuf>, desc: TupleDesc) -> Result<HeapFile, HeapError> {
        let path = path.into();
        let file = PageFile::open(&path)?;
        let id = Self::table_id_for(file.path())?;
        let pages = Mutex::new(file.page_count());
        Ok(HeapFile {
            id,
            desc,
            file,
            pages,
        })
    }

    fn table_id_for(path: &Path) -> Result<TableId, HeapError> {
        let canonical = path.canonicalize().map_err(|e| HeapError::Storage(e.into()))?;
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        Ok(TableId::new(hasher.finish() as u32))
    }

    /// Returns the table id of this file.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Returns the schema of tuples stored in this file.
    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the cached page count, including pages appended by
    /// uncommitted transactions.
    pub fn num_pages(&self) -> u32 {
        *self.pages.lock()
    }

    /// Returns the number of pages actually on disk.
    pub fn disk_pages(&self) -> u32 {
        self.file.page_count()
    }

    /// Reserves a fresh page at the end of the file and returns its id.
    ///
    /// Only the cached count grows; nothing is written to disk until the
    /// page is flushed at commit.
    pub fn allocate_page(&self) -> PageId {
        let mut pages = self.pages.lock();
        let pid = PageId::new(self.id, *pages);
        *pages += 1;
        trace!("table {}: allocated page {}", self.id, pid);
        pid
    }

    /// Rolls the cached page count back to the on-disk count.
    pub fn reset_num_pages(&self) {
        let mut pages = self.pages.lock();
        *pages = self.file.page_count();
    }

    /// Reads a page directly from disk, bypassing the buffer pool.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::Storage` if the page lies outside the on-disk
    /// length, or `HeapError::Codec` if its image fails to parse.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage, HeapError> {
        let mut buf = vec![0u8; crate::storage::PAGE_SIZE];
        self.file.read_page(pid.index(), &mut buf)?;
        HeapPage::from_bytes(pid, self.desc.clone(), &buf)
    }

    /// Writes a page image to disk, extending the file when the page is
    /// the first past the current end.
    pub fn write_page(&self, page: &HeapPage) -> Result<(), HeapError> {
        self.file.write_page(page.id().index(), &page.to_bytes())?;
        // A direct write can outrun the cached count (e.g. tests seeding a
        // file); never let the cache lag behind disk.
        let mut pages = self.pages.lock();
        *pages = (*pages).max(self.file.page_count());
        Ok(())
    }

    /// Inserts a tuple on behalf of `tid`, going through the buffer pool.
    ///
    /// Pages are probed front to back with READ permission; a full page's
    /// read lock is released immediately (the probe revealed nothing worth
    /// protecting). The first page with room is re-fetched with WRITE
    /// permission, upgrading the held read lock. If every page is full, a
    /// fresh page is appended and fetched with WRITE permission; the buffer
    /// pool materializes it as a zeroed page without touching disk.
    ///
    /// # Errors
    ///
    /// Propagates lock timeouts (*transaction aborted*) and pool errors.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<RecordId, crate::buffer::BufferError> {
        if tuple.desc() != &self.desc {
            return Err(HeapError::SchemaMismatch.into());
        }

        let mut target = None;
        let mut index = 0;
        while index < self.num_pages() {
            let pid = PageId::new(self.id, index);
            let page = pool.get_page(Some(tid), pid, Permissions::ReadOnly)?;
            let has_room = page.read().empty_slot_count() > 0;
            if has_room {
                target = Some(pid);
                break;
            }
            pool.release_page(tid, pid);
            index += 1;
        }

        let pid = match target {
            Some(pid) => pid,
            None => self.allocate_page(),
        };

        let page = pool.get_page(Some(tid), pid, Permissions::ReadWrite)?;
        let rid = {
            let mut page = page.write();
            let rid = page.insert_tuple(tuple)?;
            page.mark_dirty(Some(tid));
            rid
        };
        pool.mark_dirty(pid);
        Ok(rid)
    }

    /// Deletes a tuple on behalf of `tid`, going through the buffer pool.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::MissingRecordId` / `HeapError::WrongPage` if the
    /// tuple does not name a slot in this file; otherwise propagates lock
    /// timeouts and page errors.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<(), crate::buffer::BufferError> {
        let rid = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        if rid.page.table() != self.id || rid.page.index() >= self.num_pages() {
            return Err(HeapError::WrongPage {
                page: PageId::new(self.id, rid.page.index()),
                record: rid.page,
            }
            .into());
        }

        let page = pool.get_page(Some(tid), rid.page, Permissions::ReadWrite)?;
        {
            let mut page = page.write();
            page.delete_tuple(tuple)?;
            page.mark_dirty(Some(tid));
        }
        pool.mark_dirty(rid.page);
        Ok(())
    }
}
