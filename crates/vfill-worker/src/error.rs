//! Worker error types.

use thiserror::Error;
use vfill_media::MediaError;
use vfill_models::LayoutError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Interpolation failed at frame {frame}: {message}")]
    Interpolation { frame: u64, message: String },

    #[error("Compositing failed at frame {frame}: {message}")]
    Compose { frame: u64, message: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[source] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn invalid_video(msg: impl Into<String>) -> Self {
        Self::InvalidVideo(msg.into())
    }

    pub fn interpolation(frame: u64, msg: impl Into<String>) -> Self {
        Self::Interpolation {
            frame,
            message: msg.into(),
        }
    }

    pub fn compose(frame: u64, msg: impl Into<String>) -> Self {
        Self::Compose {
            frame,
            message: msg.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The input or request was at fault rather than the service.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            WorkerError::InvalidVideo(_) | WorkerError::InvalidOptions(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }

    /// Pipeline stage the error belongs to, for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::InvalidVideo(_) | WorkerError::InvalidOptions(_) => "intake",
            WorkerError::Encode(_) => "encode",
            WorkerError::Interpolation { .. } => "interpolate",
            WorkerError::Compose { .. } => "compose",
            WorkerError::Cancelled | WorkerError::Timeout(_) => "job",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Media(_) | WorkerError::Io(_) | WorkerError::Internal(_) => "internal",
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => WorkerError::Cancelled,
            MediaError::EncodeFailed { .. } => WorkerError::Encode(e.to_string()),
            e if e.is_invalid_input() => WorkerError::InvalidVideo(e.to_string()),
            e => WorkerError::Media(e),
        }
    }
}

impl From<LayoutError> for WorkerError {
    fn from(e: LayoutError) -> Self {
        WorkerError::InvalidVideo(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_mapping() {
        assert!(WorkerError::from(MediaError::invalid_video("no frames")).is_user_error());
        assert!(matches!(
            WorkerError::from(MediaError::encode_failed("broken pipe", None)),
            WorkerError::Encode(_)
        ));
        assert!(WorkerError::from(MediaError::Cancelled).is_cancelled());
        assert!(!WorkerError::from(MediaError::FfmpegNotFound).is_user_error());
    }

    #[test]
    fn test_layout_error_is_invalid_video() {
        let err: WorkerError = LayoutError::ZeroDimension.into();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_interpolation_error_carries_frame() {
        let err = WorkerError::interpolation(25, "size mismatch");
        assert!(err.to_string().contains("25"));
        assert_eq!(err.stage(), "interpolate");
    }
}
