//! Application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use vfill_models::JobStats;
use vfill_outpaint::OutpaintConfig;
use vfill_worker::{VideoProcessor, WorkerConfig, WorkerResult};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub processor: Arc<VideoProcessor>,
    pub counters: Arc<ServiceCounters>,
}

impl AppState {
    /// Build state from configuration. Outputs go to `<static_dir>/output`.
    pub fn new(
        config: ApiConfig,
        worker: WorkerConfig,
        outpaint: OutpaintConfig,
    ) -> WorkerResult<Self> {
        let worker = worker.with_output_dir(config.output_dir());
        let processor = VideoProcessor::new(worker, outpaint)?;
        Ok(Self::with_processor(config, processor))
    }

    pub fn with_processor(config: ApiConfig, processor: VideoProcessor) -> Self {
        Self {
            config,
            processor: Arc::new(processor),
            counters: Arc::new(ServiceCounters::new()),
        }
    }
}

/// Cumulative counters since process start.
#[derive(Debug)]
pub struct ServiceCounters {
    started: Instant,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_degraded: AtomicU64,
    frames_processed: AtomicU64,
    ai_generated: AtomicU64,
    fallback_generated: AtomicU64,
    interpolated: AtomicU64,
}

/// Point-in-time copy of [`ServiceCounters`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountersSnapshot {
    pub uptime_secs: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_degraded: u64,
    pub frames_processed: u64,
    pub ai_generated: u64,
    pub fallback_generated: u64,
    pub interpolated: u64,
}

impl ServiceCounters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_degraded: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            ai_generated: AtomicU64::new(0),
            fallback_generated: AtomicU64::new(0),
            interpolated: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self, stats: &JobStats) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        if stats.degraded {
            self.jobs_degraded.fetch_add(1, Ordering::Relaxed);
        }
        self.frames_processed
            .fetch_add(stats.total_frames, Ordering::Relaxed);
        self.ai_generated
            .fetch_add(stats.ai_generated, Ordering::Relaxed);
        self.fallback_generated
            .fetch_add(stats.fallback_generated, Ordering::Relaxed);
        self.interpolated
            .fetch_add(stats.interpolated, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_degraded: self.jobs_degraded.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            ai_generated: self.ai_generated.load(Ordering::Relaxed),
            fallback_generated: self.fallback_generated.load(Ordering::Relaxed),
            interpolated: self.interpolated.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = ServiceCounters::new();
        let stats = JobStats {
            total_frames: 30,
            ai_generated: 4,
            interpolated: 26,
            degraded: true,
            ..Default::default()
        };
        counters.record_success(&stats);
        counters.record_success(&stats);
        counters.record_failure();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.jobs_completed, 2);
        assert_eq!(snapshot.jobs_degraded, 2);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.frames_processed, 60);
        assert_eq!(snapshot.interpolated, 52);
    }
}
