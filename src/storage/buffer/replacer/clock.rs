use crate::common::types::FrameId;
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::frame::FramePtr;

/// Clock (second-chance) replacement policy.
///
/// Keeps a circular hand over the frame table. A frame whose reference bit
/// is set survives one more sweep before it becomes evictable; pinned
/// frames are never selected.
pub struct ClockReplacer {
    hand: usize,
    num_frames: usize,
}

impl ClockReplacer {
    pub fn new(num_frames: usize) -> Self {
        // Start on the last frame so the first advance lands on frame 0.
        Self {
            hand: num_frames - 1,
            num_frames,
        }
    }

    fn advance(&mut self) {
        self.hand = if self.hand == self.num_frames - 1 {
            0
        } else {
            self.hand + 1
        };
    }

    /// Scan for a usable frame, aging reference bits along the way.
    ///
    /// One full sweep may do nothing but clear reference bits, and a second
    /// sweep then makes progress unless every frame is pinned, so the scan
    /// is bounded by two revolutions of the hand.
    pub fn select_victim(&mut self, frames: &[FramePtr]) -> Result<FrameId, BufferPoolError> {
        for _ in 0..2 * self.num_frames {
            self.advance();
            let mut frame = frames[self.hand].write();

            // A free frame is immediately usable.
            if !frame.valid {
                return Ok(self.hand as FrameId);
            }
            // Second chance: a recently used frame survives this sweep.
            if frame.referenced {
                frame.referenced = false;
                continue;
            }
            // Held frames cannot be evicted.
            if frame.pin_count != 0 {
                continue;
            }
            return Ok(self.hand as FrameId);
        }

        Err(BufferPoolError::PoolExhausted {
            pool_size: self.num_frames,
        })
    }
}
