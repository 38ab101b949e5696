//! Player event types
//!
//! Events describe player state transitions. The engine returns them from
//! `tick()` and command calls and also broadcasts them to subscribers; every
//! transition is reported exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Why playback stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Explicit `stop()` call
    UserStop,
    /// Stream ended and both queues drained
    EndOfStream,
    /// Source closed by `open()` of another source or `clear()`
    Closed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::UserStop => write!(f, "user_stop"),
            StopReason::EndOfStream => write!(f, "end_of_stream"),
            StopReason::Closed => write!(f, "closed"),
        }
    }
}

/// Events emitted by the player
///
/// `session_id` identifies the opened source the event belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A source was opened
    MediaOpened {
        session_id: Uuid,
        duration_secs: f64,
        has_video: bool,
        timestamp: DateTime<Utc>,
    },

    /// Player state changed
    StateChanged {
        session_id: Uuid,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Seek completed; queues flushed and clock reset to `position_secs`
    Seeked {
        session_id: Uuid,
        position_secs: f64,
        timestamp: DateTime<Utc>,
    },

    /// Decoder backend reported end of stream (queues may still hold frames)
    EndOfStream {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Media playback stopped
    MediaStopped {
        session_id: Uuid,
        reason: StopReason,
        timestamp: DateTime<Utc>,
    },

    /// Audio output had run dry and was restarted
    StallRecovered {
        session_id: Uuid,
        position_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::MediaOpened { .. } => "MediaOpened",
            PlayerEvent::StateChanged { .. } => "StateChanged",
            PlayerEvent::Seeked { .. } => "Seeked",
            PlayerEvent::EndOfStream { .. } => "EndOfStream",
            PlayerEvent::MediaStopped { .. } => "MediaStopped",
            PlayerEvent::StallRecovered { .. } => "StallRecovered",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            PlayerEvent::MediaOpened { session_id, .. }
            | PlayerEvent::StateChanged { session_id, .. }
            | PlayerEvent::Seeked { session_id, .. }
            | PlayerEvent::EndOfStream { session_id, .. }
            | PlayerEvent::MediaStopped { session_id, .. }
            | PlayerEvent::StallRecovered { session_id, .. } => *session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_display() {
        assert_eq!(PlaybackState::Stopped.to_string(), "stopped");
        assert_eq!(PlaybackState::Playing.to_string(), "playing");
        assert_eq!(PlaybackState::Paused.to_string(), "paused");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let session_id = Uuid::new_v4();
        let event = PlayerEvent::MediaStopped {
            session_id,
            reason: StopReason::EndOfStream,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["reason"], "end_of_stream");
        assert_eq!(json["session_id"], session_id.to_string());
    }

    #[test]
    fn test_state_changed_roundtrip() {
        let event = PlayerEvent::StateChanged {
            session_id: Uuid::new_v4(),
            old_state: PlaybackState::Stopped,
            new_state: PlaybackState::Playing,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: PlayerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.session_id(), event.session_id());
    }
}
