#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and frame imaging.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Encoder progress tracking from `-progress pipe:2`
//! - FFprobe inspection with exact rational frame rates
//! - Raw RGB24 frame decoding into memory
//! - Raw RGB24 frame encoding to H.264 through FFmpeg's stdin
//! - Image operations for extension bands (mirror fallback, blending, compositing)

pub mod command;
pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;
pub mod fs_utils;
pub mod imaging;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use decode::decode_video;
pub use encode::{FrameEncoder, FrameSink, MemorySink};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, SourceVideo};
pub use fs_utils::{discard_partial, move_file, partial_path};
pub use imaging::{
    average_color, blend, compose_canvas, cut_bands, mirror_extension, widen_to_canvas,
};
pub use vfill_models::BandPosition;
pub use probe::{probe_video, FrameRate, VideoInfo};
pub use progress::{EncodeProgress, ProgressLine};
