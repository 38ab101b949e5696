//! Playback buffering and synchronization
//!
//! - `frame_pool` / `frame_queue` / `buffers`: per-session frame storage
//! - `scheduler` + `decoder_worker`: when and where decode batches run
//! - `clock` + `synchronizer`: audio-mastered presentation
//! - `engine`: the player state machine tying it together

pub mod buffers;
pub mod clock;
pub mod decoder_worker;
pub mod engine;
pub mod events;
pub mod frame_pool;
pub mod frame_queue;
pub mod scheduler;
pub mod synchronizer;

pub use buffers::MediaBuffers;
pub use engine::{BufferStatus, MediaPlayer, TickReport};
pub use frame_pool::{FramePool, PoolStats};
pub use frame_queue::{AudioQueue, FrameQueue, VideoQueue};
pub use scheduler::{DecodeScheduler, ScheduleOutcome};
