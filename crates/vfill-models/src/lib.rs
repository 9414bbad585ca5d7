//! Shared data models for the vfill backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle state
//! - Processing options (full vs keyframe sampling)
//! - Extension status tags and degrade reasons
//! - Canvas geometry for the 9:16 output
//! - Encoding configuration and job statistics

pub mod encoding;
pub mod extension;
pub mod job;
pub mod layout;
pub mod processing;
pub mod stats;

// Re-export common types
pub use encoding::EncodingConfig;
pub use extension::{DegradeReason, ExtensionStatus};
pub use job::{JobId, JobState, VideoJob};
pub use layout::{AspectRatio, BandPosition, CanvasLayout, LayoutError};
pub use processing::{
    is_allowed_container, output_file_name, ProcessingMode, ProcessingOptions,
    ALLOWED_EXTENSIONS, DEFAULT_KEYFRAME_INTERVAL,
};
pub use stats::JobStats;
