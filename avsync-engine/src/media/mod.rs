//! Media data types and the collaborator interfaces
//!
//! - `types`: decoded frames and stream metadata
//! - `backend`: the decoder backend contract and its cancellation token
//! - `output`: audio/video sinks and the audio subsystem handle

pub mod backend;
pub mod output;
pub mod types;

pub use backend::{BackendError, BatchOutcome, DecoderBackend, FrameSink, InterruptToken};
pub use output::{AudioDevice, AudioSink, AudioSubsystem, SinkError, VideoSink};
pub use types::{AudioFrame, FrameBuffer, QueuedFrame, StreamInfo, VideoFrame};
