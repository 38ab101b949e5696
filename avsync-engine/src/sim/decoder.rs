//! Synthetic decoder backend
//!
//! Generates interleaved audio and video frames on a fixed timeline instead
//! of decoding a file. Sources are registered under a path and opened like
//! files. Each video frame carries its index in the first 8 bytes of its
//! pixel buffer (little-endian) so sinks can check ordering.

use crate::media::backend::{BackendError, BatchOutcome, DecoderBackend, FrameSink, InterruptToken};
use crate::media::types::{AudioFrame, StreamInfo, VideoFrame};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Bytes per PCM sample (signed 16-bit)
const BYTES_PER_SAMPLE: usize = 2;

/// Timeline description of a synthetic stream
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSource {
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in each audio frame
    pub samples_per_frame: usize,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
    pub has_video: bool,
}

impl SyntheticSource {
    /// 30 fps video with 48 kHz stereo audio
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            sample_rate: 48_000,
            channels: 2,
            samples_per_frame: 1024,
            frame_rate: 30.0,
            width: 64,
            height: 36,
            has_audio: true,
            has_video: true,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Samples per channel in each audio frame
    pub fn with_samples_per_frame(mut self, samples: usize) -> Self {
        self.samples_per_frame = samples;
        self
    }

    pub fn audio_only(mut self) -> Self {
        self.has_video = false;
        self.frame_rate = 0.0;
        self.width = 0;
        self.height = 0;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_rate: self.frame_rate,
            width: self.width,
            height: self.height,
            duration: self.duration,
            has_video: self.has_video,
            has_audio: self.has_audio,
        }
    }

    pub fn total_samples(&self) -> u64 {
        avsync_common::timing::seconds_to_samples(self.duration, self.sample_rate)
    }

    pub fn audio_frame_count(&self) -> u64 {
        if !self.has_audio || self.samples_per_frame == 0 {
            return 0;
        }
        self.total_samples().div_ceil(self.samples_per_frame as u64)
    }

    pub fn video_frame_count(&self) -> u64 {
        if !self.has_video || self.frame_rate <= 0.0 {
            return 0;
        }
        (self.duration * self.frame_rate).ceil() as u64
    }

    fn audio_timestamp(&self, index: u64) -> f64 {
        (index * self.samples_per_frame as u64) as f64 / self.sample_rate as f64
    }

    fn video_timestamp(&self, index: u64) -> f64 {
        index as f64 / self.frame_rate
    }
}

/// Read the frame index stamped into a synthetic video frame
pub fn frame_index(pixels: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = pixels.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Counters observable from outside the player
#[derive(Debug, Default)]
pub struct DecoderStats {
    batches: AtomicUsize,
    frames: AtomicUsize,
    skipped: AtomicUsize,
    interrupted: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    seeks: AtomicUsize,
}

impl DecoderStats {
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Batches that returned early because of an interrupt
    pub fn interrupted(&self) -> usize {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Highest number of batches ever running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }
}

pub struct SyntheticDecoder {
    sources: HashMap<PathBuf, SyntheticSource>,
    /// Sources that probe fine but fail to open (truncated files)
    broken: HashSet<PathBuf>,
    current: Option<SyntheticSource>,
    next_audio: u64,
    next_video: u64,
    packet_delay: Duration,
    skip_every: Option<usize>,
    packets: usize,
    stats: Arc<DecoderStats>,
}

impl SyntheticDecoder {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            broken: HashSet::new(),
            current: None,
            next_audio: 0,
            next_video: 0,
            packet_delay: Duration::ZERO,
            skip_every: None,
            packets: 0,
            stats: Arc::new(DecoderStats::default()),
        }
    }

    /// Make `source` openable at `path`
    pub fn with_source(mut self, path: impl Into<PathBuf>, source: SyntheticSource) -> Self {
        self.sources.insert(path.into(), source);
        self
    }

    /// Register `source` at `path` so that `probe` succeeds but `open` fails
    pub fn with_broken_source(mut self, path: impl Into<PathBuf>, source: SyntheticSource) -> Self {
        let path = path.into();
        self.broken.insert(path.clone());
        self.sources.insert(path, source);
        self
    }

    /// Sleep this long per packet to emulate decode cost
    pub fn with_packet_delay(mut self, delay: Duration) -> Self {
        self.packet_delay = delay;
        self
    }

    /// Fail to decode every `n`th packet
    pub fn with_skip_every(mut self, n: usize) -> Self {
        self.skip_every = (n > 0).then_some(n);
        self
    }

    pub fn stats(&self) -> Arc<DecoderStats> {
        Arc::clone(&self.stats)
    }

    fn lookup(&self, path: &Path) -> Result<&SyntheticSource, BackendError> {
        self.sources
            .get(path)
            .ok_or_else(|| BackendError::NotFound(path.display().to_string()))
    }

    fn emit_audio(source: &SyntheticSource, index: u64, sink: &mut dyn FrameSink) {
        let start = index * source.samples_per_frame as u64;
        let remaining = source.total_samples().saturating_sub(start);
        let samples = remaining.min(source.samples_per_frame as u64) as usize;
        let pcm = vec![0u8; samples * source.channels as usize * BYTES_PER_SAMPLE];
        sink.push_audio(AudioFrame::new(
            pcm,
            source.channels,
            samples,
            source.sample_rate,
            source.audio_timestamp(index),
        ));
    }

    fn emit_video(source: &SyntheticSource, index: u64, sink: &mut dyn FrameSink) {
        let len = source.info().video_frame_len().max(8);
        let mut buffer = sink.acquire_video_buffer(len);
        buffer.pixels_mut()[..8].copy_from_slice(&index.to_le_bytes());
        sink.push_video(VideoFrame::new(
            buffer,
            source.width,
            source.height,
            source.video_timestamp(index),
        ));
    }
}

impl Default for SyntheticDecoder {
    fn default() -> Self {
        Self::new()
    }
}

enum Packet {
    Audio(u64),
    Video(u64),
}

impl DecoderBackend for SyntheticDecoder {
    fn probe(&self, path: &Path) -> Result<StreamInfo, BackendError> {
        self.lookup(path).map(|source| source.info())
    }

    fn open(&mut self, path: &Path) -> Result<StreamInfo, BackendError> {
        let source = self.lookup(path)?.clone();
        if self.broken.contains(path) {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{}: truncated stream", path.display()),
            )));
        }
        let info = source.info();
        debug!("Synthetic decoder opened {} ({:.2}s)", path.display(), source.duration);
        self.current = Some(source);
        self.next_audio = 0;
        self.next_video = 0;
        self.packets = 0;
        Ok(info)
    }

    fn decode_batch(
        &mut self,
        max_frames: usize,
        sink: &mut dyn FrameSink,
        interrupt: &InterruptToken,
    ) -> BatchOutcome {
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);
        self.stats.batches.fetch_add(1, Ordering::SeqCst);

        let mut outcome = BatchOutcome::default();
        let Some(source) = self.current.clone() else {
            outcome.reached_end_of_stream = true;
            self.stats.active.fetch_sub(1, Ordering::SeqCst);
            return outcome;
        };
        let audio_count = source.audio_frame_count();
        let video_count = source.video_frame_count();

        while outcome.frames_decoded < max_frames {
            if interrupt.is_interrupted() {
                self.stats.interrupted.fetch_add(1, Ordering::SeqCst);
                break;
            }

            let audio_ts = (self.next_audio < audio_count).then(|| source.audio_timestamp(self.next_audio));
            let video_ts = (self.next_video < video_count).then(|| source.video_timestamp(self.next_video));
            let packet = match (audio_ts, video_ts) {
                (Some(a), Some(v)) if v < a => Packet::Video(self.next_video),
                (Some(_), _) => Packet::Audio(self.next_audio),
                (None, Some(_)) => Packet::Video(self.next_video),
                (None, None) => {
                    outcome.reached_end_of_stream = true;
                    break;
                }
            };

            if !self.packet_delay.is_zero() {
                std::thread::sleep(self.packet_delay);
            }

            self.packets += 1;
            let skip = self.skip_every.map_or(false, |n| self.packets % n == 0);
            match packet {
                Packet::Audio(index) => {
                    self.next_audio += 1;
                    if !skip {
                        Self::emit_audio(&source, index, sink);
                    }
                }
                Packet::Video(index) => {
                    self.next_video += 1;
                    if !skip {
                        Self::emit_video(&source, index, sink);
                    }
                }
            }

            if skip {
                trace!("Synthetic decoder: skipped packet {}", self.packets);
                outcome.packets_skipped += 1;
            } else {
                outcome.frames_decoded += 1;
            }
        }

        self.stats.frames.fetch_add(outcome.frames_decoded, Ordering::SeqCst);
        self.stats.skipped.fetch_add(outcome.packets_skipped, Ordering::SeqCst);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn seek(&mut self, time: f64) {
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);
        let Some(source) = self.current.as_ref() else {
            return;
        };
        let time = time.max(0.0);

        let audio_frame_secs = source.samples_per_frame as f64 / source.sample_rate as f64;
        self.next_audio = ((time / audio_frame_secs).floor() as u64).min(source.audio_frame_count());
        self.next_video = if source.frame_rate > 0.0 {
            ((time * source.frame_rate + 1e-9).floor() as u64).min(source.video_frame_count())
        } else {
            0
        };
        debug!(
            "Synthetic decoder seek to {:.3}s (audio frame {}, video frame {})",
            time, self.next_audio, self.next_video
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        audio: Vec<AudioFrame>,
        video: Vec<VideoFrame>,
    }

    impl FrameSink for Collect {
        fn acquire_video_buffer(&mut self, len: usize) -> crate::media::types::FrameBuffer {
            crate::media::types::FrameBuffer::new(None, vec![0; len])
        }

        fn push_audio(&mut self, frame: AudioFrame) {
            self.audio.push(frame);
        }

        fn push_video(&mut self, frame: VideoFrame) {
            self.video.push(frame);
        }
    }

    fn opened(source: SyntheticSource) -> SyntheticDecoder {
        let mut decoder = SyntheticDecoder::new().with_source("clip", source);
        decoder.open(Path::new("clip")).unwrap();
        decoder
    }

    #[test]
    fn test_frame_counts() {
        let source = SyntheticSource::new(1.0);
        assert_eq!(source.audio_frame_count(), 47);
        assert_eq!(source.video_frame_count(), 30);
        assert_eq!(source.clone().audio_only().video_frame_count(), 0);
    }

    #[test]
    fn test_interleaves_by_timestamp() {
        let mut decoder = opened(SyntheticSource::new(1.0));
        let mut sink = Collect::default();
        let outcome = decoder.decode_batch(20, &mut sink, &InterruptToken::new());

        assert_eq!(outcome.frames_decoded, 20);
        assert!(!outcome.reached_end_of_stream);
        assert!(!sink.audio.is_empty());
        assert!(!sink.video.is_empty());
        assert!(sink.video.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(frame_index(sink.video[1].buffer.pixels()), Some(1));
    }

    #[test]
    fn test_decodes_to_end_of_stream() {
        let mut decoder = opened(SyntheticSource::new(1.0));
        let mut sink = Collect::default();
        let outcome = decoder.decode_batch(1000, &mut sink, &InterruptToken::new());

        assert!(outcome.reached_end_of_stream);
        assert_eq!(outcome.frames_decoded, 77);
        let total: usize = sink.audio.iter().map(|f| f.sample_count).sum();
        assert_eq!(total, 48_000);
    }

    #[test]
    fn test_interrupt_stops_batch() {
        let mut decoder = opened(SyntheticSource::new(1.0));
        let token = InterruptToken::new();
        token.interrupt();
        let mut sink = Collect::default();
        let outcome = decoder.decode_batch(10, &mut sink, &token);

        assert_eq!(outcome.frames_decoded, 0);
        assert!(!outcome.reached_end_of_stream);
        assert_eq!(decoder.stats().interrupted(), 1);
    }

    #[test]
    fn test_skipped_packets_are_counted() {
        let mut decoder = opened(SyntheticSource::new(1.0)).with_skip_every(4);
        let mut sink = Collect::default();
        let outcome = decoder.decode_batch(9, &mut sink, &InterruptToken::new());

        assert_eq!(outcome.frames_decoded, 9);
        assert_eq!(outcome.packets_skipped, 3);
        assert_eq!(sink.audio.len() + sink.video.len(), 9);
    }

    #[test]
    fn test_seek_repositions() {
        let mut decoder = opened(SyntheticSource::new(10.0));
        decoder.seek(5.0);
        let mut sink = Collect::default();
        decoder.decode_batch(10, &mut sink, &InterruptToken::new());

        assert_eq!(sink.video[0].timestamp, 5.0);
        assert!(sink.audio[0].timestamp <= 5.0);
        assert!(5.0 - sink.audio[0].timestamp < 1024.0 / 48_000.0);
    }

    #[test]
    fn test_broken_source_probes_but_does_not_open() {
        let mut decoder = opened(SyntheticSource::new(1.0)).with_broken_source("bad", SyntheticSource::new(2.0));
        assert_eq!(decoder.probe(Path::new("bad")).unwrap().duration, 2.0);
        assert!(matches!(decoder.open(Path::new("bad")), Err(BackendError::Io(_))));
        assert_eq!(decoder.current.as_ref().map(|s| s.duration), Some(1.0));
    }

    #[test]
    fn test_long_audio_frames() {
        let source = SyntheticSource::new(2.5).with_samples_per_frame(48_000);
        assert_eq!(source.audio_frame_count(), 3);
        let mut decoder = opened(source);
        let mut sink = Collect::default();
        decoder.decode_batch(1000, &mut sink, &InterruptToken::new());
        let counts: Vec<usize> = sink.audio.iter().map(|f| f.sample_count).collect();
        assert_eq!(counts, vec![48_000, 48_000, 24_000]);
    }

    #[test]
    fn test_probe_does_not_change_current() {
        let decoder = SyntheticDecoder::new().with_source("a", SyntheticSource::new(1.0));
        assert!(decoder.probe(Path::new("a")).is_ok());
        assert!(matches!(decoder.probe(Path::new("b")), Err(BackendError::NotFound(_))));
        assert!(decoder.current.is_none());
    }
}
