//! Test helpers for avsync-engine integration tests
//!
//! `Harness` wires a `MediaPlayer` to the synthetic decoder and simulated
//! sinks and steps it deterministically: advance the audio device by one
//! host frame, tick, then wait for any decode batch the tick requested.

#![allow(dead_code)]

use avsync_common::{PlaybackState, PlayerEvent, StopReason};
use avsync_engine::media::AudioSubsystem;
use avsync_engine::sim::{
    DecoderStats, RecordingVideoSink, SimulatedAudioDevice, SimulatedAudioSink, SyntheticDecoder, SyntheticSource,
};
use avsync_engine::{EngineConfig, MediaPlayer, TickReport};
use std::sync::Arc;

/// Path the default test clip is registered under
pub const CLIP: &str = "clips/test.syn";

/// Host frame period (60 Hz UI)
pub const FRAME_DT: f64 = 1.0 / 60.0;

pub struct Harness {
    pub player: MediaPlayer,
    pub audio: SimulatedAudioSink,
    pub video: RecordingVideoSink,
    pub stats: Arc<DecoderStats>,
    pub dt: f64,
}

impl Harness {
    /// Player with `source` registered at [`CLIP`] and default config
    pub fn new(source: SyntheticSource) -> Self {
        Self::with_decoder(SyntheticDecoder::new().with_source(CLIP, source), EngineConfig::default())
    }

    pub fn with_decoder(decoder: SyntheticDecoder, config: EngineConfig) -> Self {
        let audio = SimulatedAudioSink::new();
        let device = SimulatedAudioDevice::new(audio.clone());
        Self::with_device(decoder, config, device, audio)
    }

    pub fn with_device(
        decoder: SyntheticDecoder,
        config: EngineConfig,
        device: SimulatedAudioDevice,
        audio: SimulatedAudioSink,
    ) -> Self {
        let stats = decoder.stats();
        let video = RecordingVideoSink::new();
        let subsystem = Arc::new(AudioSubsystem::new(Box::new(device)));
        let player = MediaPlayer::new(subsystem, Box::new(decoder), Some(Box::new(video.clone())), config)
            .expect("player should start");

        Self {
            player,
            audio,
            video,
            stats,
            dt: FRAME_DT,
        }
    }

    /// Open the clip, start playing and run the two startup ticks
    ///
    /// The first tick requests the initial batch; the second feeds its audio
    /// and presents the first video frame. No device time passes.
    pub fn open_and_play(&mut self) -> Vec<TickReport> {
        self.player.open(CLIP).expect("clip should open");
        self.player.play().expect("play should succeed");
        self.prime()
    }

    pub fn prime(&mut self) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..2 {
            reports.push(self.player.tick());
            self.player.test_wait_decode_idle();
        }
        reports
    }

    /// Advance the device one host frame, tick, and wait for decode
    pub fn step(&mut self) -> TickReport {
        self.audio.advance(self.dt);
        let report = self.player.tick();
        self.player.test_wait_decode_idle();
        report
    }

    pub fn run_ticks(&mut self, ticks: usize) -> Vec<TickReport> {
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Run `secs` seconds of host frames
    pub fn run_for(&mut self, secs: f64) -> Vec<TickReport> {
        let ticks = (secs / self.dt).round() as usize;
        self.run_ticks(ticks)
    }

    /// Step until the player stops (or `max_ticks` pass)
    pub fn run_until_stopped(&mut self, max_ticks: usize) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..max_ticks {
            reports.push(self.step());
            if self.player.is_stopped() {
                break;
            }
        }
        reports
    }
}

pub fn events(reports: &[TickReport]) -> Vec<PlayerEvent> {
    reports.iter().flat_map(|r| r.events.iter().cloned()).collect()
}

pub fn count_events(reports: &[TickReport], event_type: &str) -> usize {
    reports
        .iter()
        .flat_map(|r| r.events.iter())
        .filter(|e| e.event_type() == event_type)
        .count()
}

/// Number of transitions into `state`
pub fn count_transitions_to(reports: &[TickReport], state: PlaybackState) -> usize {
    reports
        .iter()
        .flat_map(|r| r.events.iter())
        .filter(|e| matches!(e, PlayerEvent::StateChanged { new_state, .. } if *new_state == state))
        .count()
}

pub fn stop_reasons(reports: &[TickReport]) -> Vec<StopReason> {
    reports
        .iter()
        .flat_map(|r| r.events.iter())
        .filter_map(|e| match e {
            PlayerEvent::MediaStopped { reason, .. } => Some(*reason),
            _ => None,
        })
        .collect()
}
