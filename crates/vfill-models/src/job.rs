//! Job definitions for pipeline runs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::ProcessingOptions;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted, not started yet
    #[default]
    Pending,
    /// Job is being processed
    Processing,
    /// Output video written
    Completed,
    /// Job failed with a fatal error
    Failed,
    /// Job was aborted by the caller
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// A single horizontal-to-vertical conversion request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    /// Unique job ID
    pub id: JobId,

    /// Path of the uploaded source video
    pub input_path: PathBuf,

    /// Directory the vertical output is written to
    pub output_dir: PathBuf,

    /// Sampling options
    #[serde(default)]
    pub options: ProcessingOptions,

    /// Job state
    #[serde(default)]
    pub state: JobState,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VideoJob {
    /// Create a new pending job.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        options: ProcessingOptions,
    ) -> Self {
        Self {
            id: JobId::new(),
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            options,
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Mark the job as started.
    pub fn start(&mut self) {
        self.state = JobState::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Mark the job as finished with the given terminal state.
    pub fn finish(&mut self, state: JobState, error: Option<String>) {
        self.state = state;
        self.completed_at = Some(Utc::now());
        self.error_message = error;
    }
}
