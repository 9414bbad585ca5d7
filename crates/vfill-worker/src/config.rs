//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vfill_models::EncodingConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum outpainting calls in flight per job
    pub max_outpaint_parallel: usize,
    /// Job timeout
    pub job_timeout: Duration,
    /// Work directory for temporary files
    pub work_dir: String,
    /// Where finished `<stem>_vertical.mp4` files are written
    pub output_dir: PathBuf,
    /// Output encoding settings
    pub encoding: EncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_outpaint_parallel: 4,
            job_timeout: Duration::from_secs(3600), // 1 hour
            work_dir: "/tmp/vfill".to_string(),
            output_dir: PathBuf::from("static/output"),
            encoding: EncodingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_outpaint_parallel: std::env::var("WORKER_MAX_OUTPAINT_PARALLEL")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(4)
                .max(1),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or_else(|_| "/tmp/vfill".to_string()),
            output_dir: std::env::var("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/output")),
            encoding: EncodingConfig::default(),
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_max_outpaint_parallel(mut self, parallel: usize) -> Self {
        self.max_outpaint_parallel = parallel.max(1);
        self
    }
}
