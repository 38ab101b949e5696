//! Media player
//!
//! Owns one source session at a time and supervises the playback state
//! machine:
//!
//! - Stopped → Playing on `play()` (source open, sinks ready)
//! - Playing ⇄ Paused on `pause()` / `play()`
//! - any → Stopped → Playing on `seek()`
//! - Playing → Stopped when the stream has ended and both queues drained
//! - any → Stopped on `stop()`
//!
//! The host calls [`MediaPlayer::tick`] once per UI frame. Commands and ticks
//! run on the host thread; decoding runs on the worker thread.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::media::backend::DecoderBackend;
use crate::media::output::{AudioSink, AudioSubsystem, VideoSink};
use crate::media::types::StreamInfo;
use crate::playback::buffers::MediaBuffers;
use crate::playback::decoder_worker::{DecodeWorker, SharedBackend};
use crate::playback::events::EventEmitter;
use crate::playback::frame_pool::PoolStats;
use crate::playback::scheduler::{DecodeFlags, DecodeScheduler, ScheduleOutcome};
use crate::playback::synchronizer::Synchronizer;
use avsync_common::events::{PlaybackState, PlayerEvent, StopReason};
use avsync_common::timing::clamp_position;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of one `tick()`
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// Playback clock after the synchronization step (seconds)
    pub clock: f64,

    /// Timestamp of the video frame presented this tick
    pub presented: Option<f64>,

    pub audio_fed: usize,
    pub audio_reclaimed: usize,
    pub video_evicted: usize,
    pub stall_restarted: bool,

    /// Scheduler decision; `None` when not playing
    pub schedule: Option<ScheduleOutcome>,

    /// Events from this tick and from commands issued since the previous tick
    pub events: Vec<PlayerEvent>,
}

/// Buffering diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct BufferStatus {
    pub state: PlaybackState,
    pub audio_queued: usize,
    pub video_queued: usize,
    /// Buffers held by the audio device
    pub hw_queued: usize,
    pub decoding: bool,
    pub end_of_stream: bool,
    pub pool: PoolStats,
}

pub struct MediaPlayer {
    config: EngineConfig,
    subsystem: Arc<AudioSubsystem>,
    audio_sink: Option<Box<dyn AudioSink>>,
    video_sink: Option<Box<dyn VideoSink>>,

    buffers: Arc<MediaBuffers>,
    flags: Arc<DecodeFlags>,
    scheduler: DecodeScheduler,
    synchronizer: Synchronizer,
    worker: DecodeWorker,

    state: PlaybackState,
    stream: Option<StreamInfo>,
    session_id: Option<Uuid>,
    end_of_stream_reported: bool,
    events: EventEmitter,
}

impl MediaPlayer {
    /// Create a player and start its decode worker
    ///
    /// `video_sink` may be `None` for audio-only use; opening a stream with
    /// video then fails at `play()`.
    pub fn new(
        subsystem: Arc<AudioSubsystem>,
        backend: Box<dyn DecoderBackend>,
        video_sink: Option<Box<dyn VideoSink>>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let flags = Arc::new(DecodeFlags::default());
        let backend: SharedBackend = Arc::new(Mutex::new(backend));
        let worker = DecodeWorker::spawn(backend, Arc::clone(&flags), &config.worker)?;

        info!(
            "Media player created (audio device: {}, batch={}, pool cap={})",
            subsystem.device_name(),
            config.scheduler.batch_size,
            config.pool.soft_cap
        );

        Ok(Self {
            buffers: Arc::new(MediaBuffers::new(config.pool.soft_cap)),
            scheduler: DecodeScheduler::new(config.scheduler.clone()),
            synchronizer: Synchronizer::new(),
            config,
            subsystem,
            audio_sink: None,
            video_sink,
            flags,
            worker,
            state: PlaybackState::Stopped,
            stream: None,
            session_id: None,
            end_of_stream_reported: false,
            events: EventEmitter::new(),
        })
    }

    /// Open a source, replacing the current one
    ///
    /// On error the player is left exactly as it was.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<StreamInfo> {
        let path = path.as_ref();
        self.worker.interrupt_and_wait();

        let probed = self
            .worker
            .backend()
            .lock()
            .probe(path)
            .map_err(|e| Error::SourceOpen(format!("{}: {}", path.display(), e)))?;
        if !probed.has_audio {
            return Err(Error::SourceOpen(format!("{}: no audio track", path.display())));
        }

        let info = self
            .worker
            .backend()
            .lock()
            .open(path)
            .map_err(|e| Error::SourceOpen(format!("{}: {}", path.display(), e)))?;

        // Backend already holds the new source; the stop path only rewinds it
        self.close_session(StopReason::Closed);

        let session_id = Uuid::new_v4();
        self.buffers = Arc::new(MediaBuffers::new(self.config.pool.soft_cap));
        self.synchronizer.reset(0.0);
        self.session_id = Some(session_id);
        self.stream = Some(info.clone());

        info!(
            "Opened {} (session={}, duration={:.2}s, {} Hz, video={})",
            path.display(),
            session_id,
            info.duration,
            info.sample_rate,
            info.has_video
        );
        self.events.media_opened(session_id, info.duration, info.has_video);
        Ok(info)
    }

    /// Close the current source and release all buffering state
    pub fn clear(&mut self) {
        if self.session_id.is_none() {
            return;
        }
        self.close_session(StopReason::Closed);
        self.buffers = Arc::new(MediaBuffers::new(self.config.pool.soft_cap));
        info!("Player cleared");
    }

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        if self.session_id.is_none() {
            return Err(Error::InvalidState("play() with no source open".to_string()));
        }

        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                if let Some(sink) = self.audio_sink.as_mut() {
                    sink.play();
                }
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            PlaybackState::Stopped => {
                self.start_output()?;
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
        }
    }

    /// Pause playback; clock, scheduling and eviction freeze
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(sink) = self.audio_sink.as_mut() {
            sink.pause();
        }
        self.set_state(PlaybackState::Paused);
    }

    /// Stop playback and rewind to the start
    pub fn stop(&mut self) {
        if self.session_id.is_none() {
            return;
        }
        self.stop_with(StopReason::UserStop);
    }

    /// Jump to `time` seconds (clamped to the stream) and resume playing
    ///
    /// # Panics
    ///
    /// Panics if no source is open.
    pub fn seek(&mut self, time: f64) -> Result<()> {
        let (session_id, duration) = match (self.session_id, self.stream.as_ref()) {
            (Some(session_id), Some(info)) => (session_id, info.duration),
            _ => panic!("MediaPlayer::seek() called with no source open"),
        };

        let target = clamp_position(time, duration);
        if target != time {
            debug!("Seek target {:.3}s clamped to {:.3}s", time, target);
        }

        let waited = self.worker.interrupt_and_wait();
        self.buffers.flush();
        if let Some(sink) = self.audio_sink.as_mut() {
            sink.stop();
        }
        self.worker.backend().lock().seek(target);
        self.flags.clear_end_of_stream();
        self.end_of_stream_reported = false;
        self.synchronizer.reset(target);

        self.set_state(PlaybackState::Stopped);
        self.events.seeked(session_id, target);
        info!(
            "Seeked to {:.3}s (decode wait {:.1}ms)",
            target,
            waited.as_secs_f64() * 1000.0
        );

        self.start_output()?;
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Advance playback by one host frame
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            clock: self.timestamp(),
            ..TickReport::default()
        };

        if self.state == PlaybackState::Playing {
            self.tick_playing(&mut report);
        }

        report.events = self.events.drain();
        report
    }

    fn tick_playing(&mut self, report: &mut TickReport) {
        let Some(session_id) = self.session_id else {
            return;
        };
        let has_video = self.stream.as_ref().map_or(false, |s| s.has_video);
        let Some(audio_sink) = self.audio_sink.as_deref_mut() else {
            warn!("Playing without an audio sink");
            return;
        };
        let video_sink: Option<&mut dyn VideoSink> = match self.video_sink.as_mut() {
            Some(sink) if has_video => Some(sink.as_mut()),
            _ => None,
        };

        let sync = self
            .synchronizer
            .step(&self.buffers, audio_sink, video_sink, self.flags.is_decoding());
        report.clock = sync.clock;
        report.presented = sync.presented;
        report.audio_fed = sync.audio_fed;
        report.audio_reclaimed = sync.audio_reclaimed;
        report.video_evicted = sync.video_evicted;
        report.stall_restarted = sync.stall_restarted;

        if sync.stall_restarted {
            self.events.stall_recovered(session_id, sync.clock);
        }

        let hw_queued = audio_sink.queued_buffer_count();

        if self.flags.is_end_of_stream() && !self.end_of_stream_reported {
            self.end_of_stream_reported = true;
            self.events.end_of_stream(session_id);
        }

        let outcome = self
            .scheduler
            .schedule(&self.buffers, &self.flags, hw_queued, has_video);
        report.schedule = Some(outcome);

        match outcome {
            ScheduleOutcome::Requested { .. } => {
                self.worker
                    .submit(Arc::clone(&self.buffers), self.scheduler.batch_size());
            }
            ScheduleOutcome::Drained { video_flushed } => {
                report.video_evicted += video_flushed;
                info!("Stream drained at {:.3}s", sync.clock);
                self.stop_with(StopReason::EndOfStream);
            }
            _ => {}
        }
    }

    /// Stream duration in seconds (0.0 with no source)
    pub fn duration(&self) -> f64 {
        self.stream.as_ref().map_or(0.0, |s| s.duration)
    }

    /// Current playback position in seconds
    pub fn timestamp(&self) -> f64 {
        self.synchronizer.clock().current()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receive player events as they happen
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn buffer_status(&self) -> BufferStatus {
        BufferStatus {
            state: self.state,
            audio_queued: self.buffers.audio.len(),
            video_queued: self.buffers.video.len(),
            hw_queued: self
                .audio_sink
                .as_ref()
                .map_or(0, |sink| sink.queued_buffer_count()),
            decoding: self.flags.is_decoding(),
            end_of_stream: self.flags.is_end_of_stream(),
            pool: self.buffers.pool_stats(),
        }
    }

    /// Block until the in-flight decode batch (if any) finishes
    ///
    /// **Test helper only**: makes tick sequences deterministic.
    #[doc(hidden)]
    pub fn test_wait_decode_idle(&self) -> Duration {
        self.worker.wait_idle()
    }

    /// Decode batches run since the player was created
    #[doc(hidden)]
    pub fn test_batches_completed(&self) -> u64 {
        self.worker.batches_completed()
    }

    fn set_state(&mut self, new_state: PlaybackState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        info!("Playback state: {} -> {}", old_state, new_state);
        if let Some(session_id) = self.session_id {
            self.events.state_changed(session_id, old_state, new_state);
        }
    }

    /// Make sure both sinks are ready and start audio output
    fn start_output(&mut self) -> Result<()> {
        let Some(info) = self.stream.as_ref() else {
            return Err(Error::InvalidState("no source open".to_string()));
        };

        if info.has_video {
            match self.video_sink.as_ref() {
                Some(sink) if sink.is_ready() => {}
                Some(_) => return Err(Error::SinkUnavailable("video sink not ready".to_string())),
                None => {
                    return Err(Error::SinkUnavailable(
                        "stream has video but no video sink is attached".to_string(),
                    ))
                }
            }
        }

        if self.audio_sink.is_none() {
            let sink = self
                .subsystem
                .open_sink(info)
                .map_err(|e| Error::SinkUnavailable(e.to_string()))?;
            self.audio_sink = Some(sink);
        }

        if let Some(sink) = self.audio_sink.as_mut() {
            sink.play();
        }
        Ok(())
    }

    /// Shared stop path for `stop()` and end-of-stream
    fn stop_with(&mut self, reason: StopReason) {
        self.worker.interrupt_and_wait();
        let (audio, video) = self.buffers.flush();
        if let Some(sink) = self.audio_sink.as_mut() {
            sink.stop();
        }
        self.worker.backend().lock().seek(0.0);
        self.flags.clear_end_of_stream();
        self.end_of_stream_reported = false;
        self.synchronizer.reset(0.0);
        debug!("Stopped ({}): flushed {} audio, {} video frames", reason, audio, video);

        let was_stopped = self.state == PlaybackState::Stopped;
        self.set_state(PlaybackState::Stopped);
        if !was_stopped {
            if let Some(session_id) = self.session_id {
                self.events.media_stopped(session_id, reason);
            }
        }
    }

    /// Stop and forget the current session; buffers are flushed
    fn close_session(&mut self, reason: StopReason) {
        if self.session_id.is_none() {
            return;
        }
        self.stop_with(reason);
        self.audio_sink = None;
        self.session_id = None;
        self.stream = None;
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        if let Some(sink) = self.audio_sink.as_mut() {
            sink.stop();
        }
        self.worker.shutdown();
        debug!("Media player dropped");
    }
}
