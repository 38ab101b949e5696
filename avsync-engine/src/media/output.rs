//! Audio and video output interfaces
//!
//! The audio sink follows a queued-buffer model: the engine enqueues PCM
//! buffers, the device plays them in order, and the engine later reclaims
//! the ones reported as processed.

use crate::media::types::StreamInfo;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Output device failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Device not ready: {0}")]
    NotReady(String),

    #[error("Unsupported format: {channels} channels at {sample_rate} Hz")]
    UnsupportedFormat { channels: u16, sample_rate: u32 },
}

/// Queued-buffer audio output
pub trait AudioSink: Send {
    /// Append a PCM buffer to the playback queue
    fn enqueue(&mut self, pcm: Vec<u8>, sample_count: usize, sample_rate: u32);

    /// Buffers held by the device, processed ones included
    fn queued_buffer_count(&self) -> usize;

    /// Buffers fully played but not yet reclaimed
    fn processed_buffer_count(&self) -> usize;

    /// Release up to `n` processed buffers from the head; returns how many were released
    fn unqueue_processed(&mut self, n: usize) -> usize;

    fn play(&mut self);

    fn pause(&mut self);

    /// Stop output and drop every held buffer
    fn stop(&mut self);

    /// True while the device is outputting (false after an underrun)
    fn is_playing(&self) -> bool;

    /// Samples played since the start of the oldest buffer still held
    fn hardware_sample_offset(&self) -> u64;
}

/// Presentation surface for decoded video frames
pub trait VideoSink: Send {
    fn present(&mut self, pixels: &[u8], width: u32, height: u32);

    fn is_ready(&self) -> bool;
}

/// Platform audio backend that opens sinks
pub trait AudioDevice: Send + Sync {
    fn name(&self) -> &str;

    fn open_sink(&self, info: &StreamInfo) -> Result<Box<dyn AudioSink>, SinkError>;
}

/// Process-level audio handle
///
/// Created once before any player and shared (`Arc`) by every player that
/// outputs audio. Outlives the players holding it.
pub struct AudioSubsystem {
    device: Box<dyn AudioDevice>,
}

impl AudioSubsystem {
    pub fn new(device: Box<dyn AudioDevice>) -> Self {
        info!("Audio subsystem initialized: {}", device.name());
        Self { device }
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Open a sink for the stream's audio format
    pub fn open_sink(&self, info: &StreamInfo) -> Result<Box<dyn AudioSink>, SinkError> {
        debug!(
            "Opening audio sink on {}: {} Hz, {} channels",
            self.device.name(),
            info.sample_rate,
            info.channels
        );
        self.device.open_sink(info)
    }
}

impl fmt::Debug for AudioSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSubsystem")
            .field("device", &self.device.name())
            .finish()
    }
}
