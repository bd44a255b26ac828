//! Storage layer errors.

/// Errors from page-granular file I/O.
#[derive(Debug)]
pub enum StorageError {
    /// The requested page lies outside the on-disk length of the file.
    PageOutOfRange {
        /// Index of the requested page.
        index: u32,
        /// Number of pages currently on disk.
        on_disk: u32,
    },

    /// A read or write buffer was not exactly `PAGE_SIZE` bytes.
    InvalidBufferSize {
        /// Expected buffer size (PAGE_SIZE).
        expected: usize,
        /// Actual buffer size provided.
        actual: usize,
    },

    /// The file has an invalid format (length not a multiple of PAGE_SIZE).
    Corrupted(String),

    /// I/O error from the underlying file system.
    Io(std::io::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::PageOutOfRange { index, on_disk } => {
                write!(f, "page {} out of range: file has {} pages", index, on_disk)
            }
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(f, "invalid buffer size: expected {}, got {}", expected, actual)
            }
            StorageError::Corrupted(msg) => write!(f, "corrupted file: {}", msg),
            StorageError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}
