//! # avsync Common Library
//!
//! Shared code for the avsync playback engine and its host tools:
//! - Error type used by configuration loading
//! - Configuration file discovery and TOML loading
//! - Event types (PlayerEvent, PlaybackState, StopReason)
//! - Seconds ↔ samples timing helpers

pub mod config;
pub mod error;
pub mod events;
pub mod timing;

pub use error::{Error, Result};
pub use events::{PlaybackState, PlayerEvent, StopReason};
