//! Timing helpers for the playback clock
//!
//! Stream timestamps are seconds (f64) relative to stream start. Audio
//! progress is reported by output devices in samples at the stream's sample
//! rate. These helpers convert between the two.
//!
//! # Examples
//!
//! ```rust
//! use avsync_common::timing::*;
//!
//! assert_eq!(samples_to_seconds(48_000, 48_000), 1.0);
//! assert_eq!(seconds_to_samples(0.5, 44_100), 22_050);
//! assert_eq!(buffer_duration(1024, 48_000), 1024.0 / 48_000.0);
//! ```

/// Convert a sample count to seconds at `sample_rate`.
///
/// Returns 0.0 for a zero sample rate instead of dividing by zero.
pub fn samples_to_seconds(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / sample_rate as f64
}

/// Convert seconds to a whole sample count at `sample_rate` (rounded to nearest).
///
/// Negative inputs clamp to zero.
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as u64
}

/// Duration in seconds of a buffer holding `sample_count` samples per channel
pub fn buffer_duration(sample_count: usize, sample_rate: u32) -> f64 {
    samples_to_seconds(sample_count as u64, sample_rate)
}

/// Duration in seconds of one video frame at `frame_rate`.
///
/// Returns 0.0 for non-positive or non-finite rates.
pub fn frame_duration(frame_rate: f64) -> f64 {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return 0.0;
    }
    1.0 / frame_rate
}

/// Clamp a requested position into `[0, duration]`
pub fn clamp_position(position: f64, duration: f64) -> f64 {
    if position.is_nan() || position <= 0.0 {
        return 0.0;
    }
    position.min(duration.max(0.0))
}
