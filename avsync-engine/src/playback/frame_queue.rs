//! Decoded frame queues
//!
//! A `FrameQueue` is a FIFO of decoded frames ordered by presentation
//! timestamp, guarded by its own mutex. Frames leaving the queue go to the
//! queue's [`Recycler`]: the frame pool for video, nowhere for audio.
//!
//! Single operations (`enqueue`, `dequeue`, `front_timestamp`, `len`,
//! `flush_all`) take the lock briefly. Multi-step work such as scanning,
//! marking frames consumed and evicting from the head goes through
//! [`FrameQueue::lock`] so it runs under one lock hold.

use crate::media::types::{AudioFrame, QueuedFrame, VideoFrame};
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// Destination for frames removed from a queue
pub trait Recycler<T>: Send + Sync {
    fn recycle(&self, frame: T);
}

/// Recycler that drops frames
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl<T> Recycler<T> for Discard {
    fn recycle(&self, _frame: T) {}
}

/// Mutex-guarded FIFO of decoded frames
pub struct FrameQueue<T> {
    frames: Mutex<VecDeque<T>>,
    recycler: Arc<dyn Recycler<T>>,
}

pub type AudioQueue = FrameQueue<AudioFrame>;
pub type VideoQueue = FrameQueue<VideoFrame>;

impl<T: QueuedFrame> FrameQueue<T> {
    pub fn new(recycler: Arc<dyn Recycler<T>>) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            recycler,
        }
    }

    /// Append to the tail
    pub fn enqueue(&self, frame: T) {
        let mut frames = self.frames.lock();
        if let Some(back) = frames.back() {
            if frame.timestamp() < back.timestamp() {
                warn!(
                    "Frame queue: out-of-order enqueue ({:.4}s after {:.4}s)",
                    frame.timestamp(),
                    back.timestamp()
                );
            }
        }
        frames.push_back(frame);
    }

    /// Remove up to `n` frames from the head; returns how many were removed
    pub fn dequeue(&self, n: usize) -> usize {
        self.lock().evict_front(n)
    }

    pub fn front_timestamp(&self) -> Option<f64> {
        self.frames.lock().front().map(|f| f.timestamp())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Remove every frame; returns how many were removed
    pub fn flush_all(&self) -> usize {
        self.lock().flush()
    }

    /// Hold the queue lock for a multi-step operation
    pub fn lock(&self) -> QueueGuard<'_, T> {
        QueueGuard {
            frames: self.frames.lock(),
            recycler: self.recycler.as_ref(),
        }
    }
}

/// Exclusive access to a queue's frames
pub struct QueueGuard<'a, T> {
    frames: MutexGuard<'a, VecDeque<T>>,
    recycler: &'a dyn Recycler<T>,
}

impl<'a, T: QueuedFrame> QueueGuard<'a, T> {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn front(&self) -> Option<&T> {
        self.frames.front()
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.frames.front_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.frames.iter_mut()
    }

    /// Index of the last frame with `timestamp <= time`
    pub fn last_at_or_before(&self, time: f64) -> Option<usize> {
        // Timestamps are non-decreasing, so stop at the first later frame
        self.frames
            .iter()
            .take_while(|f| f.timestamp() <= time)
            .count()
            .checked_sub(1)
    }

    /// Remove up to `n` frames from the head through the recycler
    pub fn evict_front(&mut self, n: usize) -> usize {
        let count = n.min(self.frames.len());
        for frame in self.frames.drain(..count) {
            self.recycler.recycle(frame);
        }
        count
    }

    pub fn flush(&mut self) -> usize {
        let count = self.frames.len();
        self.evict_front(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Recycler<AudioFrame> for Counting {
        fn recycle(&self, _frame: AudioFrame) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame(ts: f64) -> AudioFrame {
        AudioFrame::new(vec![0; 4], 1, 2, 48_000, ts)
    }

    fn queue() -> (AudioQueue, Arc<Counting>) {
        let recycler = Arc::new(Counting::default());
        (FrameQueue::new(recycler.clone()), recycler)
    }

    #[test]
    fn test_fifo_order() {
        let (q, _) = queue();
        q.enqueue(frame(0.0));
        q.enqueue(frame(0.1));
        q.enqueue(frame(0.2));
        assert_eq!(q.len(), 3);
        assert_eq!(q.front_timestamp(), Some(0.0));

        assert_eq!(q.dequeue(2), 2);
        assert_eq!(q.front_timestamp(), Some(0.2));
    }

    #[test]
    fn test_dequeue_more_than_len() {
        let (q, recycled) = queue();
        q.enqueue(frame(0.0));
        assert_eq!(q.dequeue(5), 1);
        assert!(q.is_empty());
        assert_eq!(q.front_timestamp(), None);
        assert_eq!(recycled.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flush_routes_through_recycler() {
        let (q, recycled) = queue();
        for i in 0..5 {
            q.enqueue(frame(i as f64));
        }
        assert_eq!(q.flush_all(), 5);
        assert!(q.is_empty());
        assert_eq!(recycled.0.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_last_at_or_before() {
        let (q, _) = queue();
        for ts in [0.0, 0.1, 0.2, 0.3] {
            q.enqueue(frame(ts));
        }
        let guard = q.lock();
        assert_eq!(guard.last_at_or_before(-1.0), None);
        assert_eq!(guard.last_at_or_before(0.0), Some(0));
        assert_eq!(guard.last_at_or_before(0.25), Some(2));
        assert_eq!(guard.last_at_or_before(9.0), Some(3));
    }

    #[test]
    fn test_guard_marks_consumed() {
        let q: AudioQueue = FrameQueue::new(Arc::new(Discard));
        q.enqueue(frame(0.0));
        q.enqueue(frame(0.1));
        {
            let mut guard = q.lock();
            for f in guard.iter_mut() {
                f.mark_consumed();
            }
        }
        assert!(q.lock().iter().all(|f| f.is_consumed()));
    }
}
