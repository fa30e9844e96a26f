use thiserror::Error;

use crate::common::types::{FrameId, PageId};
use crate::storage::file::FileError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Buffer pool exhausted: all {pool_size} frames are pinned")]
    PoolExhausted { pool_size: usize },
    #[error("Page {page_id} of file '{file}' is not pinned")]
    PageNotPinned {
        file: String,
        page_id: PageId,
        frame_id: FrameId,
    },
    #[error("Page {page_id} of file '{file}' is still pinned (frame {frame_id})")]
    PagePinned {
        file: String,
        page_id: PageId,
        frame_id: FrameId,
    },
    #[error(
        "Frame {frame_id} is in an inconsistent state (valid={valid}, dirty={dirty}, referenced={referenced})"
    )]
    InconsistentFrame {
        frame_id: FrameId,
        valid: bool,
        dirty: bool,
        referenced: bool,
    },
    #[error("File error: {0}")]
    FileError(#[from] FileError),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
