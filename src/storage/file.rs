//! File-backed page I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::error::StorageError;
use super::page::PAGE_SIZE;

/// Page-granular access to a single on-disk file.
///
/// Pages are stored as contiguous `PAGE_SIZE` blocks; the file length is
/// always a multiple of the page size. A mutex around the file handle
/// serializes seeks against reads and writes.
///
/// # File Layout
///
/// ```text
/// +-----------------+-----------------+-----------------+
/// | Page 0 (4KB)    | Page 1 (4KB)    | Page 2 (4KB)    | ...
/// +-----------------+-----------------+-----------------+
/// ^ offset 0        ^ offset 4096     ^ offset 8192
/// ```
pub struct PageFile {
    /// Path to the backing file.
    path: PathBuf,
    /// File handle wrapped in a mutex for serialized access.
    file: Mutex<File>,
    /// Number of pages currently on disk.
    pages: AtomicU32,
}

impl PageFile {
    /// Opens or creates a page file at the given path.
    ///
    /// If the file exists, its page count is calculated from the file size.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the file size is not a multiple
    /// of `PAGE_SIZE`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file size {} is not a multiple of page size {}",
                len, PAGE_SIZE
            )));
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            pages: AtomicU32::new((len / PAGE_SIZE as u64) as u32),
        })
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages currently on disk.
    pub fn page_count(&self) -> u32 {
        self.pages.load(Ordering::Acquire)
    }

    /// Reads the page at `index` into `buf`.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidBufferSize` if `buf` is not `PAGE_SIZE` bytes
    /// - `StorageError::PageOutOfRange` if `index` lies beyond the on-disk length
    pub fn read_page(&self, index: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }

        let on_disk = self.page_count();
        if index >= on_disk {
            return Err(StorageError::PageOutOfRange { index, on_disk });
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(index as u64 * PAGE_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Writes `buf` to the page at `index`, extending the file as needed.
    ///
    /// A write past the current end leaves any skipped pages zero-filled;
    /// an all-zero page is a valid empty page, so a transaction may flush
    /// an appended page before an earlier append (still pending in
    /// another transaction) reaches disk.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidBufferSize` if `buf` is not
    /// `PAGE_SIZE` bytes.
    pub fn write_page(&self, index: u32, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(index as u64 * PAGE_SIZE as u64))?;
        file.write_all(buf)?;

        let on_disk = self.page_count();
        if index >= on_disk {
            self.pages.store(index + 1, Ordering::Release);
        }
        Ok(())
    }

    /// Flushes all written pages to durable storage.
    pub fn sync_all(&self) -> Result<(), StorageError> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn page_of(byte: u8) -> Vec<u8> {
        vec![byte; PAGE_SIZE]
    }

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        let file = PageFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("t.dat")).unwrap();

        file.write_page(0, &page_of(0xaa)).unwrap();
        file.write_page(1, &page_of(0xbb)).unwrap();
        assert_eq!(file.page_count(), 2);

        let mut buf = vec![0u8; PAGE_SIZE];
        file.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, page_of(0xaa));
        file.read_page(1, &mut buf).unwrap();
        assert_eq!(buf, page_of(0xbb));
    }

    #[test]
    fn test_read_out_of_range() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("t.dat")).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            file.read_page(0, &mut buf),
            Err(StorageError::PageOutOfRange { .. })
        ));
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("t.dat")).unwrap();

        file.write_page(2, &page_of(0xcc)).unwrap();
        assert_eq!(file.page_count(), 3);

        let mut buf = vec![0xffu8; PAGE_SIZE];
        file.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, page_of(0));
        file.read_page(2, &mut buf).unwrap();
        assert_eq!(buf, page_of(0xcc));
    }

    #[test]
    fn test_buffer_size_validation() {
        let dir = tempdir().unwrap();
        let file = PageFile::open(dir.path().join("t.dat")).unwrap();

        let mut small = vec![0u8; 100];
        assert!(matches!(
            file.read_page(0, &mut small),
            Err(StorageError::InvalidBufferSize { .. })
        ));
        assert!(matches!(
            file.write_page(0, &small),
            Err(StorageError::InvalidBufferSize { .. })
        ));
    }

    #[test]
    fn test_corrupted_file_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(matches!(
            PageFile::open(&path),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn test_persistence_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        {
            let file = PageFile::open(&path).unwrap();
            file.write_page(0, &page_of(0x11)).unwrap();
            file.sync_all().unwrap();
        }

        let file = PageFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 1);
        let mut buf = vec![0u8; PAGE_SIZE];
        file.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, page_of(0x11));
    }
}
