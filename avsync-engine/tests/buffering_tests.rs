//! Buffering and scheduling tests against the public playback API
//!
//! Exercises the queues, pool and decode scheduler directly, without a
//! player or worker thread.

use avsync_engine::config::SchedulerConfig;
use avsync_engine::media::{AudioFrame, FrameSink, VideoFrame};
use avsync_engine::playback::buffers::BatchSink;
use avsync_engine::playback::scheduler::DecodeFlags;
use avsync_engine::playback::{DecodeScheduler, MediaBuffers, ScheduleOutcome};

fn push_video(buffers: &MediaBuffers, count: usize) {
    let mut sink = BatchSink::new(buffers);
    for i in 0..count {
        let buffer = sink.acquire_video_buffer(64);
        sink.push_video(VideoFrame::new(buffer, 4, 4, i as f64 / 30.0));
    }
}

fn push_audio(buffers: &MediaBuffers, count: usize) {
    let mut sink = BatchSink::new(buffers);
    for i in 0..count {
        let ts = (i * 1024) as f64 / 48_000.0;
        sink.push_audio(AudioFrame::new(vec![0; 4096], 2, 1024, 48_000, ts));
    }
}

#[test]
fn test_starved_audio_drops_exactly_one_stale_video_frame() {
    let buffers = MediaBuffers::new(32);
    let flags = DecodeFlags::default();
    push_video(&buffers, 40);

    let scheduler = DecodeScheduler::new(SchedulerConfig::default());
    let outcome = scheduler.schedule(&buffers, &flags, 0, true);

    assert_eq!(outcome, ScheduleOutcome::Requested { dropped_stale: true });
    assert_eq!(buffers.video.len(), 39);
    assert!(flags.is_decoding());
}

#[test]
fn test_flush_returns_pooled_and_releases_unpooled() {
    let buffers = MediaBuffers::new(32);
    push_video(&buffers, 40);

    let stats = buffers.pool_stats();
    assert_eq!(stats.slots, 32);
    assert_eq!(stats.unpooled_outstanding, 8);
    assert_eq!(stats.live_buffers, 40);

    buffers.flush();
    let stats = buffers.pool_stats();
    assert_eq!(stats.free, 32);
    assert_eq!(stats.unpooled_outstanding, 0);
    assert_eq!(stats.live_buffers, 32);
}

#[test]
fn test_pool_reuses_slots_after_eviction() {
    let buffers = MediaBuffers::new(8);
    push_video(&buffers, 8);
    assert_eq!(buffers.video.dequeue(5), 5);

    push_video(&buffers, 5);
    let stats = buffers.pool_stats();
    assert_eq!(stats.slots, 8);
    assert_eq!(stats.unpooled_outstanding, 0);
    assert_eq!(stats.queued, 8);
}

#[test]
fn test_lock_both_sees_consistent_depths() {
    let buffers = MediaBuffers::new(8);
    push_audio(&buffers, 3);
    push_video(&buffers, 2);

    let (audio, video) = buffers.lock_both();
    assert_eq!(audio.len(), 3);
    assert_eq!(video.len(), 2);
    assert_eq!(audio.last_at_or_before(0.03), Some(1));
}

#[test]
fn test_custom_thresholds() {
    let config = SchedulerConfig {
        video_low_water: 5,
        audio_hw_low_water: 2,
        audio_only_low_water: 4,
        batch_size: 8,
    };
    let scheduler = DecodeScheduler::new(config);
    let buffers = MediaBuffers::new(8);
    let flags = DecodeFlags::default();
    push_audio(&buffers, 2);
    push_video(&buffers, 5);

    assert_eq!(scheduler.schedule(&buffers, &flags, 2, true), ScheduleOutcome::Sufficient);
    assert_eq!(scheduler.schedule(&buffers, &flags, 4, false), ScheduleOutcome::Sufficient);
    assert_eq!(
        scheduler.schedule(&buffers, &flags, 1, true),
        ScheduleOutcome::Requested { dropped_stale: false }
    );
    assert_eq!(scheduler.batch_size(), 8);
}
