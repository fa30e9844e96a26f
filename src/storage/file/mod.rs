pub mod disk_file;

pub use disk_file::DiskFile;

use thiserror::Error;

use crate::common::types::{FileId, Page, PageId};

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),
    #[error("Not a page file: bad header magic")]
    BadHeader,
}

/// Contract the buffer pool expects of a file of fixed-size pages.
///
/// Implementations own their persistence format; the buffer pool never
/// interprets page contents, it only moves opaque blocks keyed by page
/// number. The pool holds a reference to the owning file inside each
/// occupied frame so eviction can write back without caller involvement.
pub trait PageFile: Send + Sync {
    /// Stable identity used to key buffer pool residency.
    fn file_id(&self) -> FileId;

    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;

    /// Read the page with the given ID.
    fn read_page(&self, page_id: PageId) -> Result<Page, FileError>;

    /// Write a page back to storage.
    fn write_page(&self, page: &Page) -> Result<(), FileError>;

    /// Allocate a fresh zeroed page and return it with its new ID.
    fn allocate_page(&self) -> Result<Page, FileError>;

    /// Delete the page with the given ID, releasing its storage for reuse.
    fn delete_page(&self, page_id: PageId) -> Result<(), FileError>;
}
