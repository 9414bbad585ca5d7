//! Horizontal-to-vertical outpainting pipeline.
//!
//! This crate provides:
//! - Frame sampling (full or keyframe mode)
//! - The outpainting adapter (bounded retry, quota short-circuit, local fallback)
//! - Interpolation of extensions for frames between samples
//! - Reassembly into the 9:16 output at the source frame rate
//! - The job processor tying the stages together

pub mod adapter;
pub mod cancel;
pub mod config;
pub mod error;
pub mod extension;
pub mod interpolator;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod reassembler;
pub mod retry;
pub mod sampler;

pub use adapter::OutpaintAdapter;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use extension::ExtensionResult;
pub use interpolator::Interpolator;
pub use logging::JobLogger;
pub use processor::{JobOutput, VideoProcessor};
pub use reassembler::Reassembler;
pub use sampler::{sample_indices, sample_video};
