//! Per-session buffering state
//!
//! Both frame queues plus the frame pool. Destroyed and recreated on
//! `open`/`clear`, flushed on seek and stop.
//!
//! Lock order is audio queue, then video queue, then pool. `lock_both` is
//! the only place both queue locks are held at once.

use crate::media::backend::FrameSink;
use crate::media::types::{AudioFrame, FrameBuffer, VideoFrame};
use crate::playback::frame_pool::{FramePool, PoolStats};
use crate::playback::frame_queue::{AudioQueue, Discard, FrameQueue, QueueGuard, VideoQueue};
use std::sync::Arc;

pub struct MediaBuffers {
    pub audio: AudioQueue,
    pub video: VideoQueue,
    pub pool: Arc<FramePool>,
}

impl MediaBuffers {
    pub fn new(pool_soft_cap: usize) -> Self {
        let pool = Arc::new(FramePool::new(pool_soft_cap));
        Self {
            audio: FrameQueue::new(Arc::new(Discard)),
            video: FrameQueue::new(pool.clone()),
            pool,
        }
    }

    /// Lock audio then video
    pub fn lock_both(&self) -> (QueueGuard<'_, AudioFrame>, QueueGuard<'_, VideoFrame>) {
        let audio = self.audio.lock();
        let video = self.video.lock();
        (audio, video)
    }

    /// Empty both queues, returning video buffers to the pool
    pub fn flush(&self) -> (usize, usize) {
        let audio = self.audio.flush_all();
        let video = self.video.flush_all();
        (audio, video)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// [`FrameSink`] that feeds decode output into the session queues
pub struct BatchSink<'a> {
    buffers: &'a MediaBuffers,
    audio_frames: usize,
    video_frames: usize,
}

impl<'a> BatchSink<'a> {
    pub fn new(buffers: &'a MediaBuffers) -> Self {
        Self {
            buffers,
            audio_frames: 0,
            video_frames: 0,
        }
    }

    pub fn audio_frames(&self) -> usize {
        self.audio_frames
    }

    pub fn video_frames(&self) -> usize {
        self.video_frames
    }
}

impl FrameSink for BatchSink<'_> {
    fn acquire_video_buffer(&mut self, len: usize) -> FrameBuffer {
        self.buffers.pool.check_out(len)
    }

    fn push_audio(&mut self, frame: AudioFrame) {
        self.audio_frames += 1;
        self.buffers.audio.enqueue(frame);
    }

    fn push_video(&mut self, frame: VideoFrame) {
        self.video_frames += 1;
        self.buffers.video.enqueue(frame);
    }
}
