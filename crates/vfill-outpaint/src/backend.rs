//! The seam between the pipeline and the outpainting service.

use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::error::OutpaintResult;

/// One outpaint call.
#[derive(Debug, Clone)]
pub struct OutpaintRequest {
    /// Source frame index, for logging
    pub frame_index: u64,
    /// Full 9:16 canvas with the source frame in place and seeded bands
    pub canvas: Arc<RgbImage>,
    pub prompt: String,
}

/// Opaque image-to-image transform.
///
/// Implementations make exactly one attempt per call; retries belong to the
/// caller.
#[async_trait]
pub trait OutpaintBackend: Send + Sync {
    async fn outpaint(&self, request: &OutpaintRequest) -> OutpaintResult<RgbImage>;

    /// Short name for logs and metrics.
    fn name(&self) -> &str;
}
