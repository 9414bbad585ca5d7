//! Structured job logging.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info, warn, Span};
use vfill_models::{JobId, JobStats, ProcessingMode, ProcessingOptions};

use crate::error::WorkerError;

/// Logs one job's lifecycle with `job_id` and `mode` attached to every event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    mode: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, options: &ProcessingOptions) -> Self {
        let mode = match options.mode {
            ProcessingMode::Full => options.mode.as_str().to_string(),
            ProcessingMode::Keyframe => {
                format!("{}/{}", options.mode.as_str(), options.keyframe_interval)
            }
        };
        Self {
            job_id: job_id.to_string(),
            mode,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// `full` or `keyframe/<interval>`.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn started(&self, input: &Path) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            input = %input.display(),
            "Outpaint job started"
        );
    }

    pub fn stage(&self, stage: &str, message: &str) {
        info!(job_id = %self.job_id, stage, "{}", message);
    }

    /// One event per degradation warning collected in the stats.
    pub fn warnings(&self, stats: &JobStats) {
        for warning in &stats.warnings {
            warn!(job_id = %self.job_id, degraded = stats.degraded, "{}", warning);
        }
    }

    pub fn completed(&self, stats: &JobStats, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            frames = stats.total_frames,
            ai = stats.ai_generated,
            fallback = stats.fallback_generated,
            interpolated = stats.interpolated,
            api_calls = stats.api_calls,
            degraded = stats.degraded,
            "Outpaint job completed in {:.1}s",
            elapsed.as_secs_f64()
        );
    }

    pub fn failed(&self, e: &WorkerError) {
        if e.is_cancelled() {
            warn!(job_id = %self.job_id, stage = e.stage(), "Outpaint job cancelled");
        } else {
            error!(
                job_id = %self.job_id,
                stage = e.stage(),
                user_error = e.is_user_error(),
                "Outpaint job failed: {}",
                e
            );
        }
    }

    /// Span carrying the job ID for everything logged inside it.
    pub fn span(&self) -> Span {
        tracing::info_span!("outpaint_job", job_id = %self.job_id, mode = %self.mode)
    }
}
