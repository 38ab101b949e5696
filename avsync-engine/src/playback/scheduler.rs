//! Decode scheduling policy
//!
//! Evaluated once per tick while playing. Decides whether to request another
//! decode batch from the worker, keeping at most one batch in flight.
//!
//! - Video streams: request when the video queue is under `video_low_water`
//!   or the audio device holds fewer than `audio_hw_low_water` buffers. If
//!   only the device backlog is low and the engine's audio queue is empty,
//!   drop one stale video frame from the head first so video cannot pile up
//!   while audio starves. If audio is still queued and the video queue has
//!   already reached the pool's soft cap, wait instead: the device backlog
//!   refills as that audio is fed, and the pool stays within
//!   `soft_cap + batch_size` live buffers.
//! - Audio-only streams: request when the device holds fewer than
//!   `audio_only_low_water` buffers.
//! - After end-of-stream: no more requests. Once the audio queue is empty the
//!   remaining video can never be reached by the clock, so it is flushed and
//!   the stream is reported drained.

use crate::config::SchedulerConfig;
use crate::playback::buffers::MediaBuffers;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Flags shared between the tick thread and the decode worker
#[derive(Debug, Default)]
pub struct DecodeFlags {
    /// A batch is in flight (set by the scheduler, cleared by the worker)
    decoding: AtomicBool,

    /// The backend reported end-of-stream
    end_of_stream: AtomicBool,
}

impl DecodeFlags {
    pub fn is_decoding(&self) -> bool {
        self.decoding.load(Ordering::Acquire)
    }

    /// Claim the single decode slot; false if a batch is already in flight
    pub fn try_begin(&self) -> bool {
        self.decoding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish(&self) {
        self.decoding.store(false, Ordering::Release);
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream.load(Ordering::Acquire)
    }

    pub fn set_end_of_stream(&self) {
        self.end_of_stream.store(true, Ordering::Release);
    }

    pub fn clear_end_of_stream(&self) {
        self.end_of_stream.store(false, Ordering::Release);
    }
}

/// What the scheduler did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// A batch is already running
    InFlight,
    /// End-of-stream seen; waiting for the audio queue to drain
    Draining,
    /// End-of-stream seen and both queues empty
    Drained { video_flushed: usize },
    /// Queues are deep enough
    Sufficient,
    /// A new batch was claimed; the caller submits it to the worker
    Requested { dropped_stale: bool },
}

pub struct DecodeScheduler {
    config: SchedulerConfig,
}

impl DecodeScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Evaluate the policy against the current queue depths
    ///
    /// `hw_queued` is the audio device's queued buffer count. On `Requested`
    /// the decode slot in `flags` has already been claimed.
    pub fn schedule(
        &self,
        buffers: &MediaBuffers,
        flags: &DecodeFlags,
        hw_queued: usize,
        has_video: bool,
    ) -> ScheduleOutcome {
        if flags.is_decoding() {
            return ScheduleOutcome::InFlight;
        }

        if flags.is_end_of_stream() {
            if !buffers.audio.is_empty() {
                return ScheduleOutcome::Draining;
            }
            let video_flushed = buffers.video.flush_all();
            if video_flushed > 0 {
                debug!("End of stream: audio drained, flushed {} unreachable video frames", video_flushed);
            }
            return ScheduleOutcome::Drained { video_flushed };
        }

        let mut dropped_stale = false;
        if has_video {
            let video_len = buffers.video.len();
            let video_low = video_len < self.config.video_low_water;
            let hw_low = hw_queued < self.config.audio_hw_low_water;
            if !video_low && !hw_low {
                return ScheduleOutcome::Sufficient;
            }
            if !video_low {
                if buffers.audio.is_empty() {
                    dropped_stale = buffers.video.dequeue(1) == 1;
                    trace!("Scheduler: audio starved with {} video frames queued, dropped stale head", video_len);
                } else if video_len >= buffers.pool.soft_cap() {
                    // Pool is full of video and audio is still queued
                    return ScheduleOutcome::Sufficient;
                }
            }
        } else if hw_queued >= self.config.audio_only_low_water {
            return ScheduleOutcome::Sufficient;
        }

        if !flags.try_begin() {
            return ScheduleOutcome::InFlight;
        }
        trace!(
            "Scheduler: requesting batch (audio={}, video={}, hw={})",
            buffers.audio.len(),
            buffers.video.len(),
            hw_queued
        );
        ScheduleOutcome::Requested { dropped_stale }
    }
}
