//! Deterministic collaborators
//!
//! Stand-ins for the decoder backend and output devices, used by the
//! `avsync-sim` host binary, the integration tests and the benchmarks.

pub mod decoder;
pub mod output;

pub use decoder::{frame_index, DecoderStats, SyntheticDecoder, SyntheticSource};
pub use output::{RecordingVideoSink, SimulatedAudioDevice, SimulatedAudioSink};
