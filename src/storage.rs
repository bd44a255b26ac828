//! Storage layer for page-based I/O.
//!
//! All persistent data lives in fixed-size pages of [`PAGE_SIZE`] bytes.
//! Each table is backed by a single file whose length is always a multiple
//! of the page size; a page is addressed by a [`PageId`], the pair of the
//! owning table's [`TableId`] and the page's index within the file.

pub mod error;
pub mod file;
pub mod page;

pub use error::StorageError;
pub use file::PageFile;
pub use page::{PageId, TableId, PAGE_SIZE};
