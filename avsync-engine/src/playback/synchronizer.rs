//! Per-tick audio/video synchronization
//!
//! Each tick while playing:
//! 1. Update the clock from the audio queue head and the device offset
//! 2. Feed every audio frame the device has not seen yet
//! 3. Reclaim processed device buffers and drop their frames from the audio queue
//! 4. Select the video frame for the current clock, evict older frames to
//!    the pool and present the selection if it changed
//! 5. Restart the audio device if it underran while buffers are available
//!
//! Video selection picks the last frame with `timestamp <= clock`, dropping
//! late frames. When none qualifies the head stays selected if it was already
//! shown; if nothing has been shown since the last reset the head is shown
//! early as a preroll frame.

use crate::media::output::{AudioSink, VideoSink};
use crate::media::types::QueuedFrame;
use crate::playback::buffers::MediaBuffers;
use crate::playback::clock::PlaybackClock;
use serde::Serialize;
use tracing::{debug, trace};

/// What one synchronization step did
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub clock: f64,
    /// Timestamp of the video frame sent to the video sink this step
    pub presented: Option<f64>,
    pub audio_fed: usize,
    pub audio_reclaimed: usize,
    pub video_evicted: usize,
    pub stall_restarted: bool,
}

#[derive(Debug, Default)]
pub struct Synchronizer {
    clock: PlaybackClock,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Reset the clock to `time` and forget the displayed frame
    pub fn reset(&mut self, time: f64) {
        self.clock.reset(time);
    }

    /// Run one synchronization step
    ///
    /// `decoding` tells whether a decode batch is in flight; the device is only
    /// restarted after an underrun when it is not.
    pub fn step(
        &mut self,
        buffers: &MediaBuffers,
        audio_sink: &mut dyn AudioSink,
        video_sink: Option<&mut dyn VideoSink>,
        decoding: bool,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        {
            let mut audio = buffers.audio.lock();

            if let Some(front) = audio.front() {
                let (timestamp, rate) = (front.timestamp, front.sample_rate);
                self.clock.update(timestamp, audio_sink.hardware_sample_offset(), rate);
            }

            for frame in audio.iter_mut().filter(|f| !f.is_consumed()) {
                let pcm = std::mem::take(&mut frame.pcm);
                audio_sink.enqueue(pcm, frame.sample_count, frame.sample_rate);
                frame.mark_consumed();
                report.audio_fed += 1;
            }
        }
        report.clock = self.clock.current();

        {
            let (mut audio, mut video) = buffers.lock_both();

            let processed = audio_sink.processed_buffer_count();
            if processed > 0 {
                let released = audio_sink.unqueue_processed(processed);
                report.audio_reclaimed = audio.evict_front(released);
            }

            if let Some(video_sink) = video_sink {
                let clock = report.clock;
                let selected = video.last_at_or_before(clock).or_else(|| match video.front() {
                    Some(head) if head.is_consumed() || self.clock.last_displayed().is_none() => Some(0),
                    _ => None,
                });

                if let Some(index) = selected {
                    report.video_evicted = video.evict_front(index);

                    if let Some(frame) = video.front_mut() {
                        if self.clock.last_displayed() != Some(frame.timestamp) && video_sink.is_ready() {
                            video_sink.present(frame.buffer.pixels(), frame.width, frame.height);
                            frame.mark_consumed();
                            if let Some(slot) = frame.buffer.slot() {
                                buffers.pool.mark_presented(slot);
                            }
                            self.clock.set_last_displayed(frame.timestamp);
                            report.presented = Some(frame.timestamp);
                            trace!("Presented video frame {:.4}s at clock {:.4}s", frame.timestamp, clock);
                        }
                    }
                }
            }
        }

        if !audio_sink.is_playing() && !decoding && audio_sink.queued_buffer_count() > 0 {
            debug!("Audio underrun at {:.3}s, restarting output", report.clock);
            audio_sink.play();
            report.stall_restarted = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::backend::FrameSink;
    use crate::media::types::{AudioFrame, VideoFrame};
    use crate::playback::buffers::BatchSink;
    use crate::sim::{RecordingVideoSink, SimulatedAudioSink};

    const RATE: u32 = 48_000;
    const SAMPLES: usize = 1024;

    fn push_audio(buffers: &MediaBuffers, first: usize, count: usize) {
        let mut sink = BatchSink::new(buffers);
        for i in first..first + count {
            let ts = (i * SAMPLES) as f64 / RATE as f64;
            sink.push_audio(AudioFrame::new(vec![0; SAMPLES * 4], 2, SAMPLES, RATE, ts));
        }
    }

    fn push_video(buffers: &MediaBuffers, timestamps: &[f64]) {
        let mut sink = BatchSink::new(buffers);
        for (i, ts) in timestamps.iter().enumerate() {
            let mut buffer = sink.acquire_video_buffer(16);
            buffer.pixels_mut()[..8].copy_from_slice(&(i as u64).to_le_bytes());
            sink.push_video(VideoFrame::new(buffer, 2, 2, *ts));
        }
    }

    #[test]
    fn test_feeds_audio_once() {
        let buffers = MediaBuffers::new(8);
        push_audio(&buffers, 0, 4);
        let mut audio = SimulatedAudioSink::new();
        audio.play();
        let mut sync = Synchronizer::new();

        let report = sync.step(&buffers, &mut audio, None, false);
        assert_eq!(report.audio_fed, 4);
        assert_eq!(audio.queued_buffer_count(), 4);

        let report = sync.step(&buffers, &mut audio, None, false);
        assert_eq!(report.audio_fed, 0);
        assert_eq!(audio.queued_buffer_count(), 4);
    }

    #[test]
    fn test_clock_follows_device_and_reclaims() {
        let buffers = MediaBuffers::new(8);
        push_audio(&buffers, 0, 4);
        let mut audio = SimulatedAudioSink::new();
        audio.play();
        let mut sync = Synchronizer::new();
        sync.step(&buffers, &mut audio, None, false);

        // One and a half buffers played
        audio.advance((SAMPLES as f64 * 1.5) / RATE as f64);
        let report = sync.step(&buffers, &mut audio, None, false);

        let expected = (SAMPLES as f64 * 1.5) / RATE as f64;
        assert!((report.clock - expected).abs() < 1e-9);
        assert_eq!(report.audio_reclaimed, 1);
        assert_eq!(buffers.audio.len(), 3);
    }

    #[test]
    fn test_selects_latest_frame_not_after_clock() {
        let buffers = MediaBuffers::new(8);
        push_audio(&buffers, 0, 1);
        push_video(&buffers, &[0.0, 0.01, 0.02, 0.5]);
        let mut audio = SimulatedAudioSink::new();
        audio.play();
        let video_sink = RecordingVideoSink::new();
        let mut video = video_sink.clone();
        let mut sync = Synchronizer::new();

        sync.step(&buffers, &mut audio, Some(&mut video), false);
        assert_eq!(video_sink.presented(), vec![0]);

        audio.advance(0.015);
        let report = sync.step(&buffers, &mut audio, Some(&mut video), false);
        assert_eq!(report.presented, Some(0.01));
        assert_eq!(report.video_evicted, 1);
        assert_eq!(video_sink.presented(), vec![0, 1]);
        assert_eq!(buffers.video.len(), 3);
        assert_eq!(buffers.pool_stats().presented, 1);
    }

    #[test]
    fn test_preroll_then_hold_consumed_head() {
        let buffers = MediaBuffers::new(8);
        push_video(&buffers, &[0.2, 0.3]);
        let mut audio = SimulatedAudioSink::new();
        let video_sink = RecordingVideoSink::new();
        let mut video = video_sink.clone();
        let mut sync = Synchronizer::new();

        let report = sync.step(&buffers, &mut audio, Some(&mut video), false);
        assert_eq!(report.presented, Some(0.2));

        let report = sync.step(&buffers, &mut audio, Some(&mut video), false);
        assert_eq!(report.presented, None);
        assert_eq!(report.video_evicted, 0);
        assert_eq!(video_sink.presented(), vec![0]);
        assert_eq!(buffers.video.len(), 2);
    }

    #[test]
    fn test_no_early_frame_after_display() {
        let buffers = MediaBuffers::new(8);
        push_video(&buffers, &[0.0]);
        let mut audio = SimulatedAudioSink::new();
        let mut video = RecordingVideoSink::new();
        let mut sync = Synchronizer::new();
        sync.step(&buffers, &mut audio, Some(&mut video), false);

        // Clock is 0.0 and the shown frame was evicted; a later frame must wait
        buffers.video.flush_all();
        push_video(&buffers, &[0.5]);
        let report = sync.step(&buffers, &mut audio, Some(&mut video), false);
        assert_eq!(report.presented, None);
    }

    #[test]
    fn test_underrun_restart() {
        let buffers = MediaBuffers::new(8);
        push_audio(&buffers, 0, 2);
        let mut audio = SimulatedAudioSink::new();
        audio.play();
        let mut sync = Synchronizer::new();
        sync.step(&buffers, &mut audio, None, false);

        audio.advance(1.0);
        assert!(!audio.is_playing());

        // Decode in flight: leave the device alone
        push_audio(&buffers, 2, 1);
        let report = sync.step(&buffers, &mut audio, None, true);
        assert!(!report.stall_restarted);

        let report = sync.step(&buffers, &mut audio, None, false);
        assert!(report.stall_restarted);
        assert!(audio.is_playing());
    }
}
