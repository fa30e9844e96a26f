use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use anyhow::Result;
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use bufpool::common::types::{FileId, PAGE_SIZE, Page, PageId};
use bufpool::{BufferPoolManager, DiskFile, FileError, PageFile};

// Create a page file over a temporary path for testing
pub fn create_temp_page_file() -> Result<(NamedTempFile, Arc<dyn PageFile>)> {
    let temp_file = NamedTempFile::new()?;
    let disk_file: Arc<dyn PageFile> = Arc::new(DiskFile::open(temp_file.path())?);
    Ok((temp_file, disk_file))
}

// Create a buffer pool manager for testing
pub fn create_test_buffer_pool(pool_size: usize) -> Result<Arc<BufferPoolManager>> {
    Ok(Arc::new(BufferPoolManager::new(pool_size)?))
}

// Generate test data of specified size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// In-memory page file that counts every collaborator call, so tests can
/// assert exactly when the pool reads, writes back, allocates and deletes.
pub struct TraceFile {
    file_id: FileId,
    name: String,
    pages: Mutex<HashMap<PageId, [u8; PAGE_SIZE]>>,
    next_page_id: AtomicU32,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub allocs: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl TraceFile {
    pub fn new(file_id: FileId, name: &str) -> Self {
        Self {
            file_id,
            name: name.to_string(),
            pages: Mutex::new(HashMap::new()),
            next_page_id: AtomicU32::new(1),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            allocs: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Page contents as last written back, if the page still exists.
    pub fn stored_page(&self, page_id: PageId) -> Option<[u8; PAGE_SIZE]> {
        self.pages.lock().get(&page_id).copied()
    }
}

impl PageFile for TraceFile {
    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_id: PageId) -> Result<Page, FileError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let pages = self.pages.lock();
        let data = pages
            .get(&page_id)
            .ok_or(FileError::InvalidPageId(page_id))?;
        let mut page = Page::new(page_id);
        page.data = *data;
        Ok(page)
    }

    fn write_page(&self, page: &Page) -> Result<(), FileError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut pages = self.pages.lock();
        if !pages.contains_key(&page.page_id) {
            return Err(FileError::InvalidPageId(page.page_id));
        }
        pages.insert(page.page_id, page.data);
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page, FileError> {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        let page_id = self.next_page_id.fetch_add(1, Ordering::Relaxed);
        self.pages.lock().insert(page_id, [0u8; PAGE_SIZE]);
        Ok(Page::new(page_id))
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), FileError> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.pages
            .lock()
            .remove(&page_id)
            .map(|_| ())
            .ok_or(FileError::InvalidPageId(page_id))
    }
}

/// Build a TraceFile and the trait-object handle the pool consumes.
pub fn trace_file(file_id: FileId, name: &str) -> (Arc<TraceFile>, Arc<dyn PageFile>) {
    let file = Arc::new(TraceFile::new(file_id, name));
    let handle: Arc<dyn PageFile> = file.clone();
    (file, handle)
}
