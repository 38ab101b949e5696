//! Error types for avsync-engine
//!
//! Backend and codec failures never surface here: the decoder backend
//! degrades them to fewer frames or end-of-stream. What remains are the
//! conditions a caller can act on.

use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// The decoder backend could not open or parse the source
    #[error("Source open error: {0}")]
    SourceOpen(String),

    /// Audio or video sink is not ready for playback
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from the shared config/IO layer
    #[error(transparent)]
    Common(#[from] avsync_common::Error),

    /// Operation not valid in the current player state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
