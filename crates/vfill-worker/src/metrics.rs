//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API process installs the
//! Prometheus recorder, the CLI leaves them as no-ops.

use metrics::{counter, histogram};
use vfill_models::ExtensionStatus;

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_TOTAL: &str = "vfill_frames_total";
    pub const OUTPAINT_ATTEMPTS_TOTAL: &str = "vfill_outpaint_attempts_total";
    pub const QUOTA_EXHAUSTED_TOTAL: &str = "vfill_quota_exhausted_total";
    pub const JOB_DURATION_SECONDS: &str = "vfill_job_duration_seconds";
    pub const JOBS_TOTAL: &str = "vfill_jobs_total";
}

/// Record `count` frames whose extension came from `status`.
pub fn record_frames(status: ExtensionStatus, count: u64) {
    let labels = [("status", status.as_str().to_string())];
    counter!(names::FRAMES_TOTAL, &labels).increment(count);
}

/// Record one remote attempt and its outcome.
pub fn record_outpaint_attempt(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::OUTPAINT_ATTEMPTS_TOTAL, &labels).increment(1);
}

/// Record a job switching to fallback-only after quota exhaustion.
pub fn record_quota_exhausted() {
    counter!(names::QUOTA_EXHAUSTED_TOTAL).increment(1);
}

/// Record a finished job.
pub fn record_job(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}
