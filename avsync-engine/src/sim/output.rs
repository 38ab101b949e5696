//! Simulated output devices
//!
//! Both sinks are cheap clonable handles onto shared state, so a test or host
//! can keep one handle while the player owns another.
//!
//! The simulated audio device only plays when told to: `advance(dt)` moves
//! the playhead by `dt` seconds of samples. Running out of queued audio while
//! playing is an underrun; the device stops until `play()` is called again.

use crate::media::output::{AudioDevice, AudioSink, SinkError, VideoSink};
use crate::media::types::StreamInfo;
use crate::sim::decoder::frame_index;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct AudioState {
    /// Sample counts of held buffers, oldest first
    buffers: VecDeque<usize>,
    /// Leading buffers fully played
    processed: usize,
    /// Samples played into the first unprocessed buffer
    position: usize,
    sample_rate: u32,
    playing: bool,
    /// Fractional samples carried between `advance` calls
    carry: f64,
    samples_played: u64,
    underruns: usize,
    restarts: usize,
}

/// Queued-buffer audio sink driven by explicit time steps
#[derive(Debug, Clone, Default)]
pub struct SimulatedAudioSink {
    state: Arc<Mutex<AudioState>>,
}

impl SimulatedAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Play `dt` seconds of queued audio
    pub fn advance(&self, dt: f64) {
        let mut state = self.state.lock();
        if !state.playing || dt <= 0.0 || state.sample_rate == 0 {
            return;
        }

        let exact = dt * state.sample_rate as f64 + state.carry;
        let mut remaining = exact.floor() as usize;
        state.carry = exact - exact.floor();

        let had_pending = state.processed < state.buffers.len();
        while remaining > 0 && state.processed < state.buffers.len() {
            let left = state.buffers[state.processed] - state.position;
            if remaining >= left {
                remaining -= left;
                state.samples_played += left as u64;
                state.processed += 1;
                state.position = 0;
            } else {
                state.position += remaining;
                state.samples_played += remaining as u64;
                remaining = 0;
            }
        }

        if had_pending && state.processed == state.buffers.len() {
            trace!("Simulated audio sink underrun");
            state.playing = false;
            state.carry = 0.0;
            state.underruns += 1;
        }
    }

    /// Total samples played since creation
    pub fn samples_played(&self) -> u64 {
        self.state.lock().samples_played
    }

    pub fn underruns(&self) -> usize {
        self.state.lock().underruns
    }

    /// Times `play()` was called while stopped by an underrun
    pub fn restarts(&self) -> usize {
        self.state.lock().restarts
    }

    fn reset(&self, sample_rate: u32) {
        let mut state = self.state.lock();
        state.buffers.clear();
        state.processed = 0;
        state.position = 0;
        state.playing = false;
        state.carry = 0.0;
        state.sample_rate = sample_rate;
    }
}

impl AudioSink for SimulatedAudioSink {
    fn enqueue(&mut self, pcm: Vec<u8>, sample_count: usize, sample_rate: u32) {
        let mut state = self.state.lock();
        if pcm.is_empty() && sample_count > 0 {
            trace!("Simulated audio sink: empty payload for {} samples", sample_count);
        }
        state.sample_rate = sample_rate;
        state.buffers.push_back(sample_count);
    }

    fn queued_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    fn processed_buffer_count(&self) -> usize {
        self.state.lock().processed
    }

    fn unqueue_processed(&mut self, n: usize) -> usize {
        let mut state = self.state.lock();
        let count = n.min(state.processed);
        state.buffers.drain(..count);
        state.processed -= count;
        count
    }

    fn play(&mut self) {
        let mut state = self.state.lock();
        if !state.playing && state.underruns > 0 {
            state.restarts += 1;
        }
        state.playing = true;
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.buffers.clear();
        state.processed = 0;
        state.position = 0;
        state.playing = false;
        state.carry = 0.0;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn hardware_sample_offset(&self) -> u64 {
        let state = self.state.lock();
        let processed: usize = state.buffers.iter().take(state.processed).sum();
        (processed + state.position) as u64
    }
}

/// Audio device that hands out one shared simulated sink
#[derive(Debug, Clone)]
pub struct SimulatedAudioDevice {
    sink: SimulatedAudioSink,
    failure: Option<SinkError>,
}

impl SimulatedAudioDevice {
    pub fn new(sink: SimulatedAudioSink) -> Self {
        Self { sink, failure: None }
    }

    /// A device whose sinks can never be opened
    pub fn unavailable(reason: &str) -> Self {
        Self {
            sink: SimulatedAudioSink::new(),
            failure: Some(SinkError::NotReady(reason.to_string())),
        }
    }
}

impl AudioDevice for SimulatedAudioDevice {
    fn name(&self) -> &str {
        "simulated"
    }

    fn open_sink(&self, info: &StreamInfo) -> Result<Box<dyn AudioSink>, SinkError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if info.channels == 0 || info.sample_rate == 0 {
            return Err(SinkError::UnsupportedFormat {
                channels: info.channels,
                sample_rate: info.sample_rate,
            });
        }
        self.sink.reset(info.sample_rate);
        Ok(Box::new(self.sink.clone()))
    }
}

#[derive(Debug)]
struct VideoState {
    presented: Vec<u64>,
    ready: bool,
    last_size: Option<(u32, u32)>,
}

/// Video sink that records which frames were presented
#[derive(Debug, Clone)]
pub struct RecordingVideoSink {
    state: Arc<Mutex<VideoState>>,
}

impl RecordingVideoSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VideoState {
                presented: Vec::new(),
                ready: true,
                last_size: None,
            })),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    /// Frame indices in presentation order
    pub fn presented(&self) -> Vec<u64> {
        self.state.lock().presented.clone()
    }

    pub fn presented_count(&self) -> usize {
        self.state.lock().presented.len()
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.state.lock().last_size
    }
}

impl Default for RecordingVideoSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink for RecordingVideoSink {
    fn present(&mut self, pixels: &[u8], width: u32, height: u32) {
        let mut state = self.state.lock();
        state.presented.push(frame_index(pixels).unwrap_or(u64::MAX));
        state.last_size = Some((width, height));
    }

    fn is_ready(&self) -> bool {
        self.state.lock().ready
    }
}
