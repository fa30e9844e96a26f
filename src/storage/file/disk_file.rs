use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;

use crate::common::types::{FileId, INVALID_PAGE_ID, PAGE_SIZE, Page, PageId};
use super::{FileError, PageFile};

/// Magic word identifying a page file header block.
const FILE_MAGIC: u32 = 0x5046_4C31; // "PFL1"

/// Process-wide source of file identities.
static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(1);

/// Allocation state kept in block 0 of the file.
#[derive(Debug, Clone, Copy)]
struct FileHeader {
    page_count: u32,
    free_head: PageId,
}

impl FileHeader {
    fn to_bytes(self) -> [u8; PAGE_SIZE] {
        let mut bytes = [0u8; PAGE_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], FILE_MAGIC);
        LittleEndian::write_u32(&mut bytes[4..8], self.page_count);
        LittleEndian::write_u32(&mut bytes[8..12], self.free_head);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, FileError> {
        if LittleEndian::read_u32(&bytes[0..4]) != FILE_MAGIC {
            return Err(FileError::BadHeader);
        }
        Ok(Self {
            page_count: LittleEndian::read_u32(&bytes[4..8]),
            free_head: LittleEndian::read_u32(&bytes[8..12]),
        })
    }
}

/// A file of fixed-size pages backed by one OS file.
///
/// Block 0 holds the header; data page N (IDs start at 1) lives at byte
/// offset `N * PAGE_SIZE`. Deleted pages are chained into a free list
/// threaded through the first four bytes of each freed block, so
/// allocation state survives reopening the file.
pub struct DiskFile {
    file_id: FileId,
    name: String,
    inner: Mutex<DiskFileInner>,
}

struct DiskFileInner {
    file: File,
    header: FileHeader,
}

impl DiskFile {
    /// Open a page file, creating it with an empty header if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let header = if file.metadata()?.len() == 0 {
            let header = FileHeader {
                page_count: 0,
                free_head: INVALID_PAGE_ID,
            };
            write_header(&mut file, &header)?;
            header
        } else {
            read_header(&mut file)?
        };

        Ok(Self {
            file_id: NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed),
            name: path.display().to_string(),
            inner: Mutex::new(DiskFileInner { file, header }),
        })
    }

    /// Number of pages ever allocated, free-listed pages included.
    pub fn page_count(&self) -> u32 {
        self.inner.lock().header.page_count
    }
}

fn write_header(file: &mut File, header: &FileHeader) -> Result<(), FileError> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.to_bytes())?;
    file.flush()?;
    Ok(())
}

fn read_header(file: &mut File) -> Result<FileHeader, FileError> {
    let mut bytes = [0u8; PAGE_SIZE];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut bytes)?;
    FileHeader::from_bytes(&bytes)
}

fn page_offset(page_id: PageId) -> u64 {
    page_id as u64 * PAGE_SIZE as u64
}

impl PageFile for DiskFile {
    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_page(&self, page_id: PageId) -> Result<Page, FileError> {
        let mut inner = self.inner.lock();
        if page_id == INVALID_PAGE_ID || page_id > inner.header.page_count {
            return Err(FileError::InvalidPageId(page_id));
        }

        let mut page = Page::new(page_id);
        inner.file.seek(SeekFrom::Start(page_offset(page_id)))?;
        inner.file.read_exact(&mut page.data)?;
        Ok(page)
    }

    fn write_page(&self, page: &Page) -> Result<(), FileError> {
        let mut inner = self.inner.lock();
        if page.page_id == INVALID_PAGE_ID || page.page_id > inner.header.page_count {
            return Err(FileError::InvalidPageId(page.page_id));
        }

        inner.file.seek(SeekFrom::Start(page_offset(page.page_id)))?;
        inner.file.write_all(&page.data)?;
        inner.file.flush()?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page, FileError> {
        let mut inner = self.inner.lock();

        let page_id = if inner.header.free_head != INVALID_PAGE_ID {
            // Reuse the head of the free list; its block stores the next link.
            let page_id = inner.header.free_head;
            let mut link = [0u8; 4];
            inner.file.seek(SeekFrom::Start(page_offset(page_id)))?;
            inner.file.read_exact(&mut link)?;
            inner.header.free_head = LittleEndian::read_u32(&link);
            page_id
        } else {
            inner.header.page_count += 1;
            inner.header.page_count
        };

        // Zero the block before handing the page out.
        inner.file.seek(SeekFrom::Start(page_offset(page_id)))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;

        let header = inner.header;
        write_header(&mut inner.file, &header)?;
        Ok(Page::new(page_id))
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), FileError> {
        let mut inner = self.inner.lock();
        if page_id == INVALID_PAGE_ID || page_id > inner.header.page_count {
            return Err(FileError::InvalidPageId(page_id));
        }

        // Chain the freed block onto the free list.
        let mut link = [0u8; 4];
        LittleEndian::write_u32(&mut link, inner.header.free_head);
        inner.file.seek(SeekFrom::Start(page_offset(page_id)))?;
        inner.file.write_all(&link)?;

        inner.header.free_head = page_id;
        let header = inner.header;
        write_header(&mut inner.file, &header)?;
        Ok(())
    }
}
