//! Decoded frame types
//!
//! Timestamps are presentation times in seconds relative to stream start.

use serde::{Deserialize, Serialize};

/// Stream metadata reported by the decoder backend on open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Audio sample rate (Hz)
    pub sample_rate: u32,

    /// Audio channel count
    pub channels: u16,

    /// Video frame rate (frames per second, 0.0 for audio-only)
    pub frame_rate: f64,

    /// Video width in pixels
    pub width: u32,

    /// Video height in pixels
    pub height: u32,

    /// Stream duration in seconds
    pub duration: f64,

    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamInfo {
    /// Bytes in one video frame (RGBA, 4 bytes per pixel)
    pub fn video_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Common view of queued frames used by the frame queue and synchronizer
pub trait QueuedFrame: Send {
    fn timestamp(&self) -> f64;

    /// True once the frame has been handed to its sink
    fn is_consumed(&self) -> bool;

    fn mark_consumed(&mut self);
}

/// Decoded PCM audio
///
/// The payload moves to the audio sink when the frame is fed; the frame stays
/// queued (timing metadata only) until the sink reports the buffer processed.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw interleaved PCM
    pub pcm: Vec<u8>,

    pub channels: u16,

    /// Samples per channel
    pub sample_count: usize,

    pub sample_rate: u32,

    pub timestamp: f64,

    pub consumed: bool,
}

impl AudioFrame {
    pub fn new(pcm: Vec<u8>, channels: u16, sample_count: usize, sample_rate: u32, timestamp: f64) -> Self {
        Self {
            pcm,
            channels,
            sample_count,
            sample_rate,
            timestamp,
            consumed: false,
        }
    }

    /// Playback duration in seconds
    pub fn duration(&self) -> f64 {
        avsync_common::timing::buffer_duration(self.sample_count, self.sample_rate)
    }
}

impl QueuedFrame for AudioFrame {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn is_consumed(&self) -> bool {
        self.consumed
    }

    fn mark_consumed(&mut self) {
        self.consumed = true;
    }
}

/// Pixel buffer handed out by the frame pool
///
/// `slot` is the pool slot the buffer belongs to, or `None` for an unpooled
/// buffer allocated while the pool was at its soft cap. Only the pool creates
/// these.
#[derive(Debug)]
pub struct FrameBuffer {
    pub(crate) slot: Option<usize>,
    pub(crate) pixels: Vec<u8>,
}

impl FrameBuffer {
    pub(crate) fn new(slot: Option<usize>, pixels: Vec<u8>) -> Self {
        Self { slot, pixels }
    }

    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn is_pooled(&self) -> bool {
        self.slot.is_some()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Decoded video frame backed by a pool buffer
#[derive(Debug)]
pub struct VideoFrame {
    pub buffer: FrameBuffer,
    pub width: u32,
    pub height: u32,
    pub timestamp: f64,
    pub consumed: bool,
}

impl VideoFrame {
    pub fn new(buffer: FrameBuffer, width: u32, height: u32, timestamp: f64) -> Self {
        Self {
            buffer,
            width,
            height,
            timestamp,
            consumed: false,
        }
    }
}

impl QueuedFrame for VideoFrame {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn is_consumed(&self) -> bool {
        self.consumed
    }

    fn mark_consumed(&mut self) {
        self.consumed = true;
    }
}
