//! avsync simulator (avsync-sim) - Main entry point
//!
//! Plays a synthetic stream through the engine in real time: a tokio
//! interval stands in for the UI frame loop, wall-clock time drives the
//! simulated audio device, and a JSON summary is printed at the end.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use avsync_common::config::{resolve_config_file, CONFIG_ENV_VAR};
use avsync_common::{PlaybackState, PlayerEvent};
use avsync_engine::media::AudioSubsystem;
use avsync_engine::playback::ScheduleOutcome;
use avsync_engine::sim::{RecordingVideoSink, SimulatedAudioDevice, SimulatedAudioSink, SyntheticDecoder, SyntheticSource};
use avsync_engine::{BufferStatus, EngineConfig, MediaPlayer};
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Path the synthetic source is registered under
const SOURCE_PATH: &str = "synthetic://clip";

/// Command-line arguments for avsync-sim
#[derive(Parser, Debug)]
#[command(name = "avsync-sim")]
#[command(about = "Drive the avsync playback engine with a synthetic stream")]
#[command(version)]
struct Args {
    /// Config file (overrides AVSYNC_CONFIG and the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stream duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Video frame rate
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Audio sample rate
    #[arg(long, default_value = "48000")]
    sample_rate: u32,

    /// Generate an audio-only stream
    #[arg(long)]
    audio_only: bool,

    /// Host UI frame rate (ticks per second)
    #[arg(long, default_value = "60", env = "AVSYNC_TICK_RATE")]
    tick_rate: u32,

    /// Stop after this many seconds of wall time (default: until end of stream)
    #[arg(long)]
    run_secs: Option<f64>,

    /// Seek once playback has run this many seconds
    #[arg(long, requires = "seek_to")]
    seek_at: Option<f64>,

    /// Seek target in stream seconds
    #[arg(long)]
    seek_to: Option<f64>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    session_id: Option<Uuid>,
    stream_duration: f64,
    wall_secs: f64,
    ticks: u64,
    frames_presented: usize,
    final_state: PlaybackState,
    final_timestamp: f64,
    decode_requests: u64,
    decode_batches: usize,
    packets_skipped: usize,
    stalls_recovered: usize,
    underruns: usize,
    events: BTreeMap<String, usize>,
    buffers: BufferStatus,
}

/// Default `EnvFilter` directive when RUST_LOG is unset
fn default_log_filter(level: &str) -> String {
    format!("avsync_common={0},avsync_engine={0},avsync_sim={0}", level)
}

/// Count events by type until the player drops its sender
///
/// Events lost to a lagging receiver are counted under `Lagged`.
async fn tally_events(mut rx: broadcast::Receiver<PlayerEvent>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!("Event: {:?}", event);
                *counts.entry(event.event_type().to_string()).or_default() += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event logger lagged, {} events dropped", skipped);
                *counts.entry("Lagged".to_string()).or_default() += skipped as usize;
            }
            Err(RecvError::Closed) => break,
        }
    }
    counts
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_source = resolve_config_file(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = EngineConfig::load(&config_source).context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting avsync-sim");
    match config_source.path() {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: built-in defaults"),
    }

    let mut source = SyntheticSource::new(args.duration)
        .with_frame_rate(args.fps)
        .with_sample_rate(args.sample_rate);
    if args.audio_only {
        source = source.audio_only();
    }

    let decoder = SyntheticDecoder::new().with_source(SOURCE_PATH, source);
    let decoder_stats = decoder.stats();

    let audio = SimulatedAudioSink::new();
    let video = RecordingVideoSink::new();
    let subsystem = Arc::new(AudioSubsystem::new(Box::new(SimulatedAudioDevice::new(audio.clone()))));

    let mut player = MediaPlayer::new(
        subsystem,
        Box::new(decoder),
        Some(Box::new(video.clone())),
        config,
    )
    .context("Failed to create media player")?;

    let event_log = tokio::spawn(tally_events(player.subscribe()));

    let info = player.open(SOURCE_PATH).context("Failed to open synthetic source")?;
    info!(
        "Stream: {:.2}s, {} Hz, {} fps, video={}",
        info.duration, info.sample_rate, info.frame_rate, info.has_video
    );
    player.play().context("Failed to start playback")?;

    let tick_rate = args.tick_rate.max(1);
    let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut last_tick = Instant::now();
    let mut ticks = 0u64;
    let mut decode_requests = 0u64;
    let mut stalls_recovered = 0usize;
    let mut seek_pending = args.seek_at.zip(args.seek_to);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }

        let now = Instant::now();
        audio.advance(now.duration_since(last_tick).as_secs_f64());
        last_tick = now;

        let report = player.tick();
        ticks += 1;
        if matches!(report.schedule, Some(ScheduleOutcome::Requested { .. })) {
            decode_requests += 1;
        }
        stalls_recovered += report
            .events
            .iter()
            .filter(|e| matches!(e, PlayerEvent::StallRecovered { .. }))
            .count();

        let elapsed = started.elapsed().as_secs_f64();
        if let Some((at, to)) = seek_pending {
            if elapsed >= at {
                seek_pending = None;
                info!("Seeking to {:.2}s", to);
                tokio::task::block_in_place(|| player.seek(to)).context("Seek failed")?;
            }
        }

        if player.is_stopped() {
            info!("Playback stopped at tick {}", ticks);
            break;
        }
        if args.run_secs.map_or(false, |limit| elapsed >= limit) {
            info!("Run limit reached");
            break;
        }
    }

    let final_timestamp = player.timestamp();
    player.stop();
    let buffers = player.buffer_status();
    let session_id = player.session_id();
    let final_state = player.state();
    drop(player);

    let events = match event_log.await {
        Ok(counts) => counts,
        Err(e) => {
            warn!("Event logger failed: {}", e);
            BTreeMap::new()
        }
    };

    let summary = RunSummary {
        session_id,
        stream_duration: info.duration,
        wall_secs: started.elapsed().as_secs_f64(),
        ticks,
        frames_presented: video.presented_count(),
        final_state,
        final_timestamp,
        decode_requests,
        decode_batches: decoder_stats.batches(),
        packets_skipped: decoder_stats.skipped(),
        stalls_recovered,
        underruns: audio.underruns(),
        events,
        buffers,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?);
    } else {
        info!(
            "Done: {} ticks, {} frames presented, position {:.3}s, {} decode batches",
            summary.ticks, summary.frames_presented, summary.final_timestamp, summary.decode_batches
        );
    }

    Ok(())
}
