//! # avsync Playback Engine (avsync-engine)
//!
//! Buffering and audio/video synchronization core of a media player.
//!
//! **Purpose:** Queue decoded frames, recycle video pixel buffers, schedule
//! decode batches on a worker thread, derive the playback clock from consumed
//! audio, and present the video frame that matches it.
//!
//! **Architecture:** The host calls [`MediaPlayer::tick`] once per UI frame.
//! Decoding happens on a dedicated `std::thread`; the tick thread only takes
//! short queue locks. Demuxing/decoding and the output devices are external
//! collaborators behind the traits in [`media`]; [`sim`] provides
//! deterministic implementations of them for the host binary and tests.

pub mod config;
pub mod error;
pub mod media;
pub mod playback;
pub mod sim;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use playback::{BufferStatus, MediaPlayer, TickReport};
