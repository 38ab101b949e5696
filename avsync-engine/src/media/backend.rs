//! Decoder backend contract
//!
//! The backend turns a seekable source into decoded audio and video frames.
//! Demuxing, codec work, colour conversion and resampling all happen behind
//! this trait; the engine only sees timestamps and buffers.
//!
//! **Cancellation:** `decode_batch` must poll the [`InterruptToken`] at least
//! once per decoded packet and return promptly once it is set. A seek waits
//! for the in-flight batch to return, so this bounds seek latency to about
//! one packet's decode time.
//!
//! **Failures:** a packet that fails to decode is skipped and counted in
//! [`BatchOutcome::packets_skipped`]. Decode errors never reach the engine.

use crate::media::types::{AudioFrame, FrameBuffer, StreamInfo, VideoFrame};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Reasons a source cannot be opened
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cooperative cancellation flag shared between the engine and the backend
#[derive(Debug, Clone, Default)]
pub struct InterruptToken {
    flag: Arc<AtomicBool>,
}

impl InterruptToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running batch to stop at the next packet boundary
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of one decode batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// The backend ran out of packets during this batch
    pub reached_end_of_stream: bool,

    /// Audio plus video frames delivered to the sink
    pub frames_decoded: usize,

    /// Packets dropped because they failed to decode
    pub packets_skipped: usize,
}

/// Destination for decoded frames
///
/// Implemented by the engine; the backend writes video pixels straight into
/// buffers acquired here so they come from the frame pool.
pub trait FrameSink {
    /// Get a pixel buffer of `len` bytes for the next video frame
    fn acquire_video_buffer(&mut self, len: usize) -> FrameBuffer;

    fn push_audio(&mut self, frame: AudioFrame);

    fn push_video(&mut self, frame: VideoFrame);
}

/// Container demuxer + codec decoder
pub trait DecoderBackend: Send {
    /// Inspect a source without changing the currently open one
    fn probe(&self, path: &Path) -> Result<StreamInfo, BackendError>;

    /// Open `path`, replacing the current source, positioned at 0
    ///
    /// On error the current source stays open and keeps its position.
    fn open(&mut self, path: &Path) -> Result<StreamInfo, BackendError>;

    /// Decode up to `max_frames` frames (audio and video combined) into `sink`
    ///
    /// Returning fewer frames than requested without being interrupted means
    /// the stream has ended.
    fn decode_batch(
        &mut self,
        max_frames: usize,
        sink: &mut dyn FrameSink,
        interrupt: &InterruptToken,
    ) -> BatchOutcome;

    /// Reposition to `time` seconds; subsequent frames start at or just before it
    fn seek(&mut self, time: f64);
}
