use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Collects pipeline statistics for a renderer session.
///
/// Counters are updated from both the capture and the presentation thread
/// without locking.
pub struct PipelineStats {
    submitted: AtomicU64,
    dropped: AtomicU64,
    probed: AtomicU64,
    rendered: AtomicU64,
    idle_polls: AtomicU64,
    blit_failures: AtomicU64,
    blitter_builds: AtomicU64,
    start_time: Mutex<Instant>,
}

/// Snapshot of pipeline stats for serialisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub fps: f64,
    pub submitted: u64,
    pub dropped: u64,
    pub drop_rate: f64,
    pub probed: u64,
    pub rendered: u64,
    pub idle_polls: u64,
    pub blit_failures: u64,
    pub blitter_builds: u64,
}

impl PipelineStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            probed: AtomicU64::new(0),
            rendered: AtomicU64::new(0),
            idle_polls: AtomicU64::new(0),
            blit_failures: AtomicU64::new(0),
            blitter_builds: AtomicU64::new(0),
            start_time: Mutex::new(Instant::now()),
        }
    }

    /// Record a buffer handed in by the capture source.
    pub fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer dropped because the queue was full.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe(&self) {
        self.probed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a render call that presented a frame.
    pub fn record_render(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a render call that found no frame queued.
    pub fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blit_failure(&self) {
        self.blit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blitter_build(&self) {
        self.blitter_builds.fetch_add(1, Ordering::Relaxed);
    }

    /// Presented frames per second since the last reset.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.lock().elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.rendered.load(Ordering::Relaxed) as f64 / elapsed
    }

    /// Drop rate as a percentage of submitted buffers (0.0 - 100.0).
    pub fn drop_rate(&self) -> f64 {
        let submitted = self.submitted.load(Ordering::Relaxed);
        if submitted == 0 {
            return 0.0;
        }
        (self.dropped.load(Ordering::Relaxed) as f64 / submitted as f64) * 100.0
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.submitted,
            &self.dropped,
            &self.probed,
            &self.rendered,
            &self.idle_polls,
            &self.blit_failures,
            &self.blitter_builds,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.start_time.lock() = Instant::now();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            fps: self.fps(),
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            drop_rate: self.drop_rate(),
            probed: self.probed.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            blit_failures: self.blit_failures.load(Ordering::Relaxed),
            blitter_builds: self.blitter_builds.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}
