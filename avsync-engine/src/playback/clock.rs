//! Playback clock
//!
//! Audio is the master: presentation time is the timestamp of the oldest
//! audio frame still held by the device plus how far the device has played
//! into it. While the audio queue is empty the clock holds.

use avsync_common::timing::samples_to_seconds;

#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    current: f64,
    last_displayed: Option<f64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute from the audio queue head and the device's sample offset
    ///
    /// Never moves backwards; only `reset` rewinds the clock.
    pub fn update(&mut self, front_timestamp: f64, offset_samples: u64, sample_rate: u32) -> f64 {
        let candidate = front_timestamp + samples_to_seconds(offset_samples, sample_rate);
        if candidate > self.current {
            self.current = candidate;
        }
        self.current
    }

    /// Jump to `time` and forget the displayed frame (seek, stop, open)
    pub fn reset(&mut self, time: f64) {
        self.current = time;
        self.last_displayed = None;
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Timestamp of the video frame last sent to the video sink since the last reset
    pub fn last_displayed(&self) -> Option<f64> {
        self.last_displayed
    }

    pub fn set_last_displayed(&mut self, timestamp: f64) {
        self.last_displayed = Some(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_adds_offset() {
        let mut clock = PlaybackClock::new();
        assert_eq!(clock.update(1.0, 24_000, 48_000), 1.5);
    }

    #[test]
    fn test_never_moves_backwards() {
        let mut clock = PlaybackClock::new();
        clock.update(2.0, 0, 48_000);
        assert_eq!(clock.update(1.9, 0, 48_000), 2.0);
        assert_eq!(clock.current(), 2.0);
    }

    #[test]
    fn test_reset_rewinds_and_clears_display() {
        let mut clock = PlaybackClock::new();
        clock.update(3.0, 0, 48_000);
        clock.set_last_displayed(2.9);

        clock.reset(0.5);
        assert_eq!(clock.current(), 0.5);
        assert_eq!(clock.last_displayed(), None);
        assert_eq!(clock.update(0.4, 0, 48_000), 0.5);
    }
}
