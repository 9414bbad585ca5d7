//! Processing options for a pipeline run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Container extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];

/// Keyframe interval used when the caller does not pick one.
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 24;

/// Frame sampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Every frame goes to the outpainting client
    #[default]
    Full,
    /// Only every `keyframe_interval`-th frame (plus the last) is outpainted
    Keyframe,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Full => "full",
            ProcessingMode::Keyframe => "keyframe",
        }
    }
}

/// Options consumed by the frame sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ProcessingOptions {
    /// Sampling mode
    #[serde(default)]
    pub mode: ProcessingMode,

    /// Keyframe spacing, used only in keyframe mode
    #[serde(default = "default_keyframe_interval")]
    #[validate(range(min = 1, message = "keyframe_interval must be a positive integer"))]
    pub keyframe_interval: u32,
}

fn default_keyframe_interval() -> u32 {
    DEFAULT_KEYFRAME_INTERVAL
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Full,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
        }
    }
}

impl ProcessingOptions {
    /// Process every frame.
    pub fn full() -> Self {
        Self::default()
    }

    /// Process keyframes spaced `interval` frames apart.
    pub fn keyframes(interval: u32) -> Self {
        Self {
            mode: ProcessingMode::Keyframe,
            keyframe_interval: interval,
        }
    }

    /// Build options from the upload form fields.
    ///
    /// A `sample_rate` above 1 with keyframes disabled is treated as keyframe
    /// mode at that interval, so skipped frames are interpolated rather than
    /// duplicated.
    pub fn from_form(use_keyframes: bool, keyframe_interval: u32, sample_rate: u32) -> Self {
        if use_keyframes {
            Self::keyframes(keyframe_interval)
        } else if sample_rate > 1 {
            Self::keyframes(sample_rate)
        } else {
            Self::full()
        }
    }
}

/// Check whether a file name has an allow-listed container extension.
pub fn is_allowed_container(file_name: impl AsRef<Path>) -> bool {
    file_name
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Output file name for a source file: `<stem>_vertical.mp4`.
pub fn output_file_name(input: impl AsRef<Path>) -> String {
    let stem = input
        .as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("video");
    format!("{}_vertical.mp4", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        let options = ProcessingOptions::keyframes(0);
        assert!(options.validate().is_err());
        assert!(ProcessingOptions::keyframes(1).validate().is_ok());
    }

    #[test]
    fn test_from_form() {
        assert_eq!(
            ProcessingOptions::from_form(true, 10, 1),
            ProcessingOptions::keyframes(10)
        );
        assert_eq!(
            ProcessingOptions::from_form(false, 10, 4),
            ProcessingOptions::keyframes(4)
        );
        assert_eq!(ProcessingOptions::from_form(false, 10, 1).mode, ProcessingMode::Full);
    }

    #[test]
    fn test_allowed_containers() {
        assert!(is_allowed_container("clip.mp4"));
        assert!(is_allowed_container("CLIP.MOV"));
        assert!(is_allowed_container("a.b.webm"));
        assert!(!is_allowed_container("clip.mkv"));
        assert!(!is_allowed_container("noext"));
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("/tmp/abc_clip.mov"), "abc_clip_vertical.mp4");
        assert_eq!(output_file_name("x.mp4"), "x_vertical.mp4");
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: ProcessingOptions = serde_json::from_str(r#"{"mode":"keyframe"}"#).unwrap();
        assert_eq!(options.mode, ProcessingMode::Keyframe);
        assert_eq!(options.keyframe_interval, DEFAULT_KEYFRAME_INTERVAL);
    }
}
