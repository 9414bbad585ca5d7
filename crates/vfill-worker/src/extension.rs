//! Per-frame extension results.

use image::RgbImage;
use std::sync::Arc;

use vfill_models::{DegradeReason, ExtensionStatus};

/// Top and bottom extension for one frame and how it was produced.
#[derive(Debug, Clone)]
pub struct ExtensionResult {
    /// Source frame index
    pub index: u64,
    pub top: Arc<RgbImage>,
    pub bottom: Arc<RgbImage>,
    pub status: ExtensionStatus,
    /// Remote attempts made for this frame
    pub attempts: u32,
    /// Set when the local fallback produced the bands
    pub degrade_reason: Option<DegradeReason>,
}

impl ExtensionResult {
    pub fn ai(index: u64, top: RgbImage, bottom: RgbImage, attempts: u32) -> Self {
        Self {
            index,
            top: Arc::new(top),
            bottom: Arc::new(bottom),
            status: ExtensionStatus::AiGenerated,
            attempts,
            degrade_reason: None,
        }
    }

    pub fn fallback(
        index: u64,
        top: Arc<RgbImage>,
        bottom: Arc<RgbImage>,
        attempts: u32,
        reason: DegradeReason,
    ) -> Self {
        Self {
            index,
            top,
            bottom,
            status: ExtensionStatus::FallbackGenerated,
            attempts,
            degrade_reason: Some(reason),
        }
    }

    pub fn interpolated(index: u64, top: Arc<RgbImage>, bottom: Arc<RgbImage>) -> Self {
        Self {
            index,
            top,
            bottom,
            status: ExtensionStatus::Interpolated,
            attempts: 0,
            degrade_reason: None,
        }
    }

    /// Band dimensions as `((top_w, top_h), (bottom_w, bottom_h))`.
    pub fn dimensions(&self) -> ((u32, u32), (u32, u32)) {
        (self.top.dimensions(), self.bottom.dimensions())
    }
}
