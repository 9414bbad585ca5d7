//! Decoded frames held in memory for one pipeline run.

use image::RgbImage;
use std::sync::Arc;

use vfill_models::{CanvasLayout, LayoutError};

use crate::probe::VideoInfo;

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Ordinal position in the source, starting at 0
    pub index: u64,
    /// Presentation time in seconds (`index / fps`)
    pub timestamp: f64,
    /// Packed RGB pixels, shared between pipeline stages
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Immutable decoded source video.
#[derive(Debug, Clone)]
pub struct SourceVideo {
    pub info: VideoInfo,
    pub frames: Vec<Frame>,
}

impl SourceVideo {
    pub fn new(info: VideoInfo, frames: Vec<Frame>) -> Self {
        Self { info, frames }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Duration implied by the frame count at the exact source rate.
    pub fn duration(&self) -> f64 {
        self.info.frame_rate.duration_of(self.frame_count())
    }

    /// Output canvas for this source.
    pub fn layout(&self) -> Result<CanvasLayout, LayoutError> {
        CanvasLayout::vertical(self.info.width, self.info.height)
    }

    pub fn frame(&self, index: u64) -> Option<&Frame> {
        self.frames.get(index as usize)
    }
}
