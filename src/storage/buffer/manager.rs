use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, error};
use parking_lot::RwLock;

use crate::common::types::{FileId, FrameId, INVALID_PAGE_ID, Page, PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::frame::{Frame, FramePtr};
use crate::storage::buffer::replacer::ClockReplacer;
use crate::storage::file::PageFile;

/// Bounded pool of page frames shared by any number of page files.
///
/// Residency is keyed by (file, page number); victims are chosen by the
/// clock replacer. The pool performs no internal synchronization beyond
/// what its handle-returning API needs — callers serialize access.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<FramePtr>,
    page_table: RwLock<HashMap<(FileId, PageId), FrameId>>,
    replacer: RwLock<ClockReplacer>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize) -> Result<Self, BufferPoolError> {
        if pool_size == 0 {
            return Err(BufferPoolError::InvalidOperation(
                "Buffer pool must have at least one frame".to_string(),
            ));
        }

        let mut frames = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            let page = Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID)));
            frames.push(Arc::new(RwLock::new(Frame::new(i as FrameId, page))));
        }

        Ok(Self {
            pool_size,
            frames,
            page_table: RwLock::new(HashMap::new()),
            replacer: RwLock::new(ClockReplacer::new(pool_size)),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch a page, reading it through the file if it is not resident.
    ///
    /// The returned page is pinned; callers must unpin it exactly once per
    /// successful fetch.
    pub fn fetch_page(
        &self,
        file: &Arc<dyn PageFile>,
        page_id: PageId,
    ) -> Result<PagePtr, BufferPoolError> {
        let key = (file.file_id(), page_id);

        // Check if the page is already resident.
        if let Some(&frame_id) = self.page_table.read().get(&key) {
            let mut frame_guard = self.frames[frame_id as usize].write();
            frame_guard.referenced = true;
            frame_guard.pin_count += 1;
            return Ok(frame_guard.page.clone());
        }

        // Not resident: evict a victim and load through the collaborator.
        let frame_id = self.allocate_frame()?;
        let data = file.read_page(page_id)?;

        let frame = &self.frames[frame_id as usize];
        {
            let mut frame_guard = frame.write();
            *frame_guard.page.write() = data;
            frame_guard.set(Arc::clone(file), page_id);
        }
        self.page_table.write().insert(key, frame_id);

        Ok(frame.read().page.clone())
    }

    /// Release one pin on a resident page; non-resident pages are ignored.
    pub fn unpin_page(
        &self,
        file: &Arc<dyn PageFile>,
        page_id: PageId,
        is_dirty: bool,
    ) -> Result<(), BufferPoolError> {
        let key = (file.file_id(), page_id);
        let frame_id = match self.page_table.read().get(&key) {
            Some(&frame_id) => frame_id,
            // Not resident: nothing to unpin.
            None => return Ok(()),
        };

        let mut frame_guard = self.frames[frame_id as usize].write();
        if frame_guard.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned {
                file: file.name().to_string(),
                page_id,
                frame_id,
            });
        }

        frame_guard.pin_count -= 1;
        // The dirty bit is sticky: only a successful write-back clears it.
        if is_dirty {
            frame_guard.is_dirty = true;
        }
        Ok(())
    }

    /// Allocate a fresh page on the file and make it resident, pinned.
    pub fn new_page(
        &self,
        file: &Arc<dyn PageFile>,
    ) -> Result<(PagePtr, PageId), BufferPoolError> {
        // The collaborator assigns the page number before a frame is chosen.
        let page = file.allocate_page()?;
        let page_id = page.page_id;
        let frame_id = self.allocate_frame()?;

        let frame = &self.frames[frame_id as usize];
        {
            let mut frame_guard = frame.write();
            *frame_guard.page.write() = page;
            frame_guard.set(Arc::clone(file), page_id);
        }
        self.page_table
            .write()
            .insert((file.file_id(), page_id), frame_id);

        Ok((frame.read().page.clone(), page_id))
    }

    /// Delete a page from its file, dropping any resident copy unwritten.
    pub fn dispose_page(
        &self,
        file: &Arc<dyn PageFile>,
        page_id: PageId,
    ) -> Result<(), BufferPoolError> {
        file.delete_page(page_id)?;

        // The on-disk page is gone; a resident copy is dropped without
        // write-back.
        if let Some(frame_id) = self
            .page_table
            .write()
            .remove(&(file.file_id(), page_id))
        {
            self.frames[frame_id as usize].write().reset();
        }
        Ok(())
    }

    /// Write back and release every resident page of one file.
    ///
    /// Fails on the first pinned frame, leaving frames already swept fully
    /// resolved and the offending frame untouched.
    pub fn flush_file(&self, file: &Arc<dyn PageFile>) -> Result<(), BufferPoolError> {
        let file_id = file.file_id();

        for slot in &self.frames {
            let mut frame_guard = slot.write();
            match &frame_guard.file {
                Some(owner) if owner.file_id() == file_id => {}
                _ => continue,
            }

            if !frame_guard.valid {
                return Err(BufferPoolError::InconsistentFrame {
                    frame_id: frame_guard.frame_id,
                    valid: frame_guard.valid,
                    dirty: frame_guard.is_dirty,
                    referenced: frame_guard.referenced,
                });
            }
            if frame_guard.pin_count != 0 {
                return Err(BufferPoolError::PagePinned {
                    file: file.name().to_string(),
                    page_id: frame_guard.page_id,
                    frame_id: frame_guard.frame_id,
                });
            }

            if frame_guard.is_dirty {
                let page = frame_guard.page.read().clone();
                file.write_page(&page)?;
            }

            debug!(
                "flushed page {} of file '{}' from frame {}",
                frame_guard.page_id,
                file.name(),
                frame_guard.frame_id
            );
            self.page_table
                .write()
                .remove(&(file_id, frame_guard.page_id));
            frame_guard.reset();
        }
        Ok(())
    }

    /// Write back every dirty frame and release all residency.
    ///
    /// A pinned frame means some caller never unpinned; the sweep stops
    /// there so the leak stays visible, with earlier frames already
    /// resolved.
    pub fn close(&self) -> Result<(), BufferPoolError> {
        for slot in &self.frames {
            let mut frame_guard = slot.write();
            if !frame_guard.valid {
                continue;
            }
            if frame_guard.pin_count != 0 {
                let file = frame_guard
                    .file
                    .as_ref()
                    .map(|f| f.name().to_string())
                    .unwrap_or_default();
                return Err(BufferPoolError::PagePinned {
                    file,
                    page_id: frame_guard.page_id,
                    frame_id: frame_guard.frame_id,
                });
            }

            if frame_guard.is_dirty {
                if let Some(file) = frame_guard.file.clone() {
                    let page = frame_guard.page.read().clone();
                    file.write_page(&page)?;
                }
            }

            if let Some(file) = &frame_guard.file {
                self.page_table
                    .write()
                    .remove(&(file.file_id(), frame_guard.page_id));
            }
            frame_guard.reset();
        }
        Ok(())
    }

    /// Snapshot every frame's descriptor state. Diagnostic, read-only.
    pub fn dump_state(&self) -> PoolSnapshot {
        let mut frames = Vec::with_capacity(self.pool_size);
        let mut valid_frames = 0;

        for slot in &self.frames {
            let frame_guard = slot.read();
            if frame_guard.valid {
                valid_frames += 1;
            }
            let data_prefix = frame_guard
                .valid
                .then(|| hex::encode(&frame_guard.page.read().data[..8]));
            frames.push(FrameSnapshot {
                frame_id: frame_guard.frame_id,
                file: frame_guard.file.as_ref().map(|f| f.name().to_string()),
                page_id: frame_guard.page_id,
                pin_count: frame_guard.pin_count,
                dirty: frame_guard.is_dirty,
                referenced: frame_guard.referenced,
                valid: frame_guard.valid,
                data_prefix,
            });
        }

        PoolSnapshot {
            frames,
            valid_frames,
        }
    }

    /// Obtain a free frame, evicting the clock victim's occupant if any.
    fn allocate_frame(&self) -> Result<FrameId, BufferPoolError> {
        let frame_id = self.replacer.write().select_victim(&self.frames)?;

        let mut frame_guard = self.frames[frame_id as usize].write();
        if frame_guard.valid {
            if let Some(file) = frame_guard.file.clone() {
                // Write-back must complete before the frame is reused.
                if frame_guard.is_dirty {
                    let page = frame_guard.page.read().clone();
                    file.write_page(&page)?;
                }
                debug!(
                    "evicting page {} of file '{}' from frame {}",
                    frame_guard.page_id,
                    file.name(),
                    frame_id
                );
                self.page_table
                    .write()
                    .remove(&(file.file_id(), frame_guard.page_id));
            }
        }
        frame_guard.reset();
        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("buffer pool dropped with unresolved frames: {}", e);
        }
    }
}

/// Read-only view of one frame's descriptor, for diagnostics.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame_id: FrameId,
    pub file: Option<String>,
    pub page_id: PageId,
    pub pin_count: u32,
    pub dirty: bool,
    pub referenced: bool,
    pub valid: bool,
    /// Hex prefix of the resident page's data, valid frames only.
    pub data_prefix: Option<String>,
}

/// Read-only view of the whole pool, for diagnostics.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub frames: Vec<FrameSnapshot>,
    pub valid_frames: usize,
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            write!(f, "frame {}: ", frame.frame_id)?;
            if frame.valid {
                writeln!(
                    f,
                    "file '{}' page {} pin={} dirty={} ref={} data={}",
                    frame.file.as_deref().unwrap_or("?"),
                    frame.page_id,
                    frame.pin_count,
                    frame.dirty,
                    frame.referenced,
                    frame.data_prefix.as_deref().unwrap_or(""),
                )?;
            } else {
                writeln!(f, "free")?;
            }
        }
        writeln!(f, "valid frames: {}", self.valid_frames)
    }
}
