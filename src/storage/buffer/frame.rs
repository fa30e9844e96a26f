use std::sync::Arc;
use parking_lot::RwLock;

use crate::common::types::{FrameId, INVALID_PAGE_ID, PageId, PagePtr};
use crate::storage::file::PageFile;

/// Buffer pool frame: one page-sized buffer plus its bookkeeping.
pub struct Frame {
    pub page: PagePtr,
    pub frame_id: FrameId,
    /// Owning file of the resident page; `None` while the frame is free.
    pub file: Option<Arc<dyn PageFile>>,
    /// Resident page number, meaningful only while `valid`.
    pub page_id: PageId,
    pub pin_count: u32,
    pub is_dirty: bool,
    /// Clock reference bit: set on access, cleared by a sweep of the hand.
    pub referenced: bool,
    pub valid: bool,
}

impl Frame {
    pub fn new(frame_id: FrameId, page: PagePtr) -> Self {
        Self {
            page,
            frame_id,
            file: None,
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            referenced: false,
            valid: false,
        }
    }

    /// Install bookkeeping for a newly resident page: pinned once,
    /// recently referenced, clean.
    pub fn set(&mut self, file: Arc<dyn PageFile>, page_id: PageId) {
        self.file = Some(file);
        self.page_id = page_id;
        self.pin_count = 1;
        self.is_dirty = false;
        self.referenced = true;
        self.valid = true;
    }

    /// Return the frame to the free state.
    pub fn reset(&mut self) {
        self.file = None;
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
        self.referenced = false;
        self.valid = false;
    }
}

/// Smart pointer to a frame
pub type FramePtr = Arc<RwLock<Frame>>;
