//! Player event delivery
//!
//! Events go out two ways: collected for the next `TickReport`, and
//! broadcast to subscribers. Sending with no subscribers is not an error.

use avsync_common::events::{PlaybackState, PlayerEvent, StopReason};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Broadcast buffer size; slow subscribers see `Lagged` beyond this
const EVENT_CHANNEL_CAPACITY: usize = 100;

pub struct EventEmitter {
    tx: broadcast::Sender<PlayerEvent>,
    pending: Vec<PlayerEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tx,
            pending: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&mut self, event: PlayerEvent) {
        debug!("Player event: {}", event.event_type());
        // No receivers is fine
        let _ = self.tx.send(event.clone());
        self.pending.push(event);
    }

    /// Take the events collected since the last call
    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn media_opened(&mut self, session_id: Uuid, duration_secs: f64, has_video: bool) {
        self.emit(PlayerEvent::MediaOpened {
            session_id,
            duration_secs,
            has_video,
            timestamp: Utc::now(),
        });
    }

    pub fn state_changed(&mut self, session_id: Uuid, old_state: PlaybackState, new_state: PlaybackState) {
        self.emit(PlayerEvent::StateChanged {
            session_id,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    pub fn seeked(&mut self, session_id: Uuid, position_secs: f64) {
        self.emit(PlayerEvent::Seeked {
            session_id,
            position_secs,
            timestamp: Utc::now(),
        });
    }

    pub fn end_of_stream(&mut self, session_id: Uuid) {
        self.emit(PlayerEvent::EndOfStream {
            session_id,
            timestamp: Utc::now(),
        });
    }

    pub fn media_stopped(&mut self, session_id: Uuid, reason: StopReason) {
        self.emit(PlayerEvent::MediaStopped {
            session_id,
            reason,
            timestamp: Utc::now(),
        });
    }

    pub fn stall_recovered(&mut self, session_id: Uuid, position_secs: f64) {
        self.emit(PlayerEvent::StallRecovered {
            session_id,
            position_secs,
            timestamp: Utc::now(),
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_collects_and_broadcasts() {
        let mut emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();
        let session = Uuid::new_v4();

        emitter.end_of_stream(session);
        emitter.media_stopped(session, StopReason::EndOfStream);

        let drained = emitter.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].event_type(), "EndOfStream");
        assert!(emitter.drain().is_empty());

        let first = rx.try_recv().unwrap();
        assert_eq!(first.session_id(), session);
        assert_eq!(rx.try_recv().unwrap().event_type(), "MediaStopped");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let mut emitter = EventEmitter::new();
        emitter.seeked(Uuid::new_v4(), 1.5);
        assert_eq!(emitter.drain().len(), 1);
    }
}
