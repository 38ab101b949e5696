//! Decode worker
//!
//! A dedicated `std::thread` that runs decode batches off the tick thread.
//! It parks on a condition variable until the scheduler submits a job (there
//! is a single job slot; the scheduler's decode flag keeps it single-flight),
//! decodes into the session queues, then clears the decode flag and wakes
//! anyone waiting for it to go idle.
//!
//! The backend sits behind a mutex shared with the engine, which locks it
//! for open/seek only after `interrupt_and_wait` has returned.

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::media::backend::{DecoderBackend, InterruptToken};
use crate::playback::buffers::{BatchSink, MediaBuffers};
use crate::playback::scheduler::DecodeFlags;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared handle to the decoder backend
pub type SharedBackend = Arc<Mutex<Box<dyn DecoderBackend>>>;

struct DecodeJob {
    buffers: Arc<MediaBuffers>,
    max_frames: usize,
}

#[derive(Default)]
struct JobSlot {
    job: Option<DecodeJob>,
    shutdown: bool,
}

struct WorkerShared {
    slot: Mutex<JobSlot>,

    /// Signalled when a job or shutdown is posted
    work: Condvar,

    /// Signalled when a batch finishes
    idle: Condvar,

    flags: Arc<DecodeFlags>,
    interrupt: InterruptToken,
    backend: SharedBackend,
    batches: AtomicU64,
}

pub struct DecodeWorker {
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,
    interrupt_poll: Duration,
    seek_wait_warn: Duration,
}

impl DecodeWorker {
    /// Spawn the worker thread
    pub fn spawn(backend: SharedBackend, flags: Arc<DecodeFlags>, config: &WorkerConfig) -> Result<Self> {
        let shared = Arc::new(WorkerShared {
            slot: Mutex::new(JobSlot::default()),
            work: Condvar::new(),
            idle: Condvar::new(),
            flags,
            interrupt: InterruptToken::new(),
            backend,
            batches: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("avsync-decode".to_string())
            .spawn(move || Self::worker_loop(worker_shared))
            .map_err(|e| Error::Common(avsync_common::Error::Io(e)))?;

        info!("Decode worker started");

        Ok(Self {
            shared,
            thread: Some(handle),
            interrupt_poll: config.interrupt_poll(),
            seek_wait_warn: config.seek_wait_warn(),
        })
    }

    /// Hand a batch to the worker; the decode flag must already be claimed
    pub fn submit(&self, buffers: Arc<MediaBuffers>, max_frames: usize) {
        let mut slot = self.shared.slot.lock();
        if slot.job.is_some() {
            warn!("Decode worker: replacing a job that never started");
        }
        slot.job = Some(DecodeJob { buffers, max_frames });
        self.shared.work.notify_one();
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.shared.backend
    }

    pub fn interrupt_token(&self) -> &InterruptToken {
        &self.shared.interrupt
    }

    /// Batches run since the worker started
    pub fn batches_completed(&self) -> u64 {
        self.shared.batches.load(Ordering::Relaxed)
    }

    /// Interrupt the in-flight batch (if any) and block until it returns
    ///
    /// Waiting is bounded by the backend's per-packet interrupt polling.
    pub fn interrupt_and_wait(&self) -> Duration {
        if !self.shared.flags.is_decoding() {
            return Duration::ZERO;
        }
        self.shared.interrupt.interrupt();
        let waited = self.wait_idle();
        self.shared.interrupt.clear();
        debug!("Decode interrupted after {:.1}ms", waited.as_secs_f64() * 1000.0);
        waited
    }

    /// Block until no batch is in flight
    pub fn wait_idle(&self) -> Duration {
        let start = Instant::now();
        let mut warned = false;
        let mut slot = self.shared.slot.lock();

        while self.shared.flags.is_decoding() {
            self.shared.idle.wait_for(&mut slot, self.interrupt_poll);

            if self.thread.as_ref().map_or(true, |h| h.is_finished()) {
                error!("Decode worker exited with a batch in flight");
                self.shared.flags.finish();
                break;
            }

            if !warned && start.elapsed() > self.seek_wait_warn {
                warn!(
                    "Waiting on decode worker for {}ms; backend is not polling the interrupt token often enough",
                    start.elapsed().as_millis()
                );
                warned = true;
            }
        }

        start.elapsed()
    }

    /// Stop the worker thread and join it
    pub fn shutdown(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };

        debug!("Shutting down decode worker");
        self.shared.interrupt.interrupt();
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            slot.job = None;
            self.shared.work.notify_one();
        }

        match handle.join() {
            Ok(()) => debug!("Decode worker joined"),
            Err(e) => error!("Decode worker join failed: {:?}", e),
        }
    }

    fn worker_loop(shared: Arc<WorkerShared>) {
        debug!("Decode worker loop started");

        loop {
            let job = {
                let mut slot = shared.slot.lock();
                while slot.job.is_none() && !slot.shutdown {
                    shared.work.wait(&mut slot);
                }
                if slot.shutdown {
                    break;
                }
                slot.job.take()
            };

            if let Some(job) = job {
                Self::run_batch(&shared, job);
            }

            let _slot = shared.slot.lock();
            shared.flags.finish();
            shared.idle.notify_all();
        }

        debug!("Decode worker loop exiting");
    }

    fn run_batch(shared: &WorkerShared, job: DecodeJob) {
        let start = Instant::now();
        let mut sink = BatchSink::new(&job.buffers);

        let outcome = {
            let mut backend = shared.backend.lock();
            backend.decode_batch(job.max_frames, &mut sink, &shared.interrupt)
        };
        shared.batches.fetch_add(1, Ordering::Relaxed);

        let interrupted = shared.interrupt.is_interrupted();
        if outcome.packets_skipped > 0 {
            warn!("Decode batch skipped {} undecodable packets", outcome.packets_skipped);
        }

        debug!(
            "Decode batch: {} audio + {} video frames in {:.1}ms{}",
            sink.audio_frames(),
            sink.video_frames(),
            start.elapsed().as_secs_f64() * 1000.0,
            if interrupted { " (interrupted)" } else { "" }
        );

        if !interrupted && (outcome.reached_end_of_stream || outcome.frames_decoded < job.max_frames) {
            info!("Decoder reached end of stream");
            shared.flags.set_end_of_stream();
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
