//! Video frame pool
//!
//! Recycles pixel buffers so steady-state playback does not allocate.
//!
//! Each pooled buffer lives in a slab slot whose state tracks who holds it:
//! - `Free`: parked in the pool, ready to be checked out
//! - `Queued`: checked out into a frame sitting in the video queue
//! - `Presented`: the frame currently shown by the video sink (still queued)
//!
//! When every slot is busy and the slab has reached the soft cap, `check_out`
//! hands out an unpooled buffer that is released on check-in.

use crate::media::types::{FrameBuffer, VideoFrame};
use crate::playback::frame_queue::Recycler;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

#[derive(Debug)]
enum SlotState {
    Free(Vec<u8>),
    Queued,
    Presented,
}

#[derive(Debug, Default)]
struct PoolInner {
    slots: Vec<SlotState>,
    presented: Option<usize>,
    unpooled_outstanding: usize,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub slots: usize,
    pub free: usize,
    pub queued: usize,
    pub presented: usize,
    pub unpooled_outstanding: usize,
    /// Pixel buffers currently allocated (slots + outstanding unpooled)
    pub live_buffers: usize,
}

/// Bounded recycler for video pixel buffers
#[derive(Debug)]
pub struct FramePool {
    inner: Mutex<PoolInner>,
    soft_cap: usize,
}

impl FramePool {
    pub fn new(soft_cap: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            soft_cap,
        }
    }

    pub fn soft_cap(&self) -> usize {
        self.soft_cap
    }

    /// Hand out a buffer of `len` bytes, recycling a free slot when one exists
    pub fn check_out(&self, len: usize) -> FrameBuffer {
        let mut inner = self.inner.lock();

        let free_slot = inner
            .slots
            .iter()
            .position(|slot| matches!(slot, SlotState::Free(_)));

        if let Some(index) = free_slot {
            let state = std::mem::replace(&mut inner.slots[index], SlotState::Queued);
            let mut pixels = match state {
                SlotState::Free(pixels) => pixels,
                _ => Vec::new(),
            };
            pixels.resize(len, 0);
            trace!("Frame pool: reused slot {}", index);
            return FrameBuffer::new(Some(index), pixels);
        }

        if inner.slots.len() < self.soft_cap {
            inner.slots.push(SlotState::Queued);
            let index = inner.slots.len() - 1;
            trace!("Frame pool: grew to {} slots", inner.slots.len());
            return FrameBuffer::new(Some(index), vec![0; len]);
        }

        inner.unpooled_outstanding += 1;
        debug!(
            "Frame pool at soft cap ({}), allocating unpooled buffer ({} outstanding)",
            self.soft_cap, inner.unpooled_outstanding
        );
        FrameBuffer::new(None, vec![0; len])
    }

    /// Return a buffer: pooled buffers are parked, unpooled ones released
    pub fn check_in(&self, buffer: FrameBuffer) {
        let mut inner = self.inner.lock();
        match buffer.slot {
            Some(index) if index < inner.slots.len() => {
                if inner.presented == Some(index) {
                    inner.presented = None;
                }
                inner.slots[index] = SlotState::Free(buffer.pixels);
            }
            Some(index) => {
                warn!("Frame pool: check-in for unknown slot {}", index);
            }
            None => {
                inner.unpooled_outstanding = inner.unpooled_outstanding.saturating_sub(1);
            }
        }
    }

    /// Record that `slot` is now on screen; the previously shown slot goes back to `Queued`
    pub fn mark_presented(&self, slot: usize) {
        let mut inner = self.inner.lock();
        if slot >= inner.slots.len() || matches!(inner.slots[slot], SlotState::Free(_)) {
            warn!("Frame pool: presenting slot {} that is not checked out", slot);
            return;
        }

        if let Some(previous) = inner.presented {
            if previous != slot && matches!(inner.slots[previous], SlotState::Presented) {
                inner.slots[previous] = SlotState::Queued;
            }
        }
        inner.slots[slot] = SlotState::Presented;
        inner.presented = Some(slot);
    }

    /// Slot currently marked as presented
    pub fn presented_slot(&self) -> Option<usize> {
        self.inner.lock().presented
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let mut stats = PoolStats {
            slots: inner.slots.len(),
            unpooled_outstanding: inner.unpooled_outstanding,
            ..PoolStats::default()
        };
        for slot in &inner.slots {
            match slot {
                SlotState::Free(_) => stats.free += 1,
                SlotState::Queued => stats.queued += 1,
                SlotState::Presented => stats.presented += 1,
            }
        }
        stats.live_buffers = stats.slots + stats.unpooled_outstanding;
        stats
    }
}

impl Recycler<VideoFrame> for FramePool {
    fn recycle(&self, frame: VideoFrame) {
        self.check_in(frame.buffer);
    }
}
