//! Outpainting adapter: bounded retry, quota short-circuit and local fallback.
//!
//! One adapter serves one job. Every call yields an [`ExtensionResult`]; remote
//! failures never surface as errors, only cancellation does.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tokio::sync::watch;
use tracing::{debug, warn};

use vfill_media::{
    average_color, compose_canvas, cut_bands, mirror_extension, widen_to_canvas, Frame,
};
use vfill_models::{BandPosition, CanvasLayout, DegradeReason};
use vfill_outpaint::{
    derive_prompt, FailureKind, OutpaintBackend, OutpaintConfig, OutpaintError, OutpaintRequest,
};

use crate::cancel::is_cancelled;
use crate::error::{WorkerError, WorkerResult};
use crate::extension::ExtensionResult;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Why a single attempt did not produce an image.
#[derive(Debug)]
enum AttemptError {
    Cancelled,
    QuotaFlagged,
    Backend(OutpaintError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Cancelled => write!(f, "job cancelled"),
            AttemptError::QuotaFlagged => write!(f, "quota exhausted earlier in the job"),
            AttemptError::Backend(e) => write!(f, "{}", e),
        }
    }
}

/// Mirror fallback bands plus the seed canvas built from them.
struct Seed {
    top: Arc<RgbImage>,
    bottom: Arc<RgbImage>,
    canvas: Arc<RgbImage>,
    prompt: String,
}

pub struct OutpaintAdapter {
    backend: Option<Arc<dyn OutpaintBackend>>,
    layout: CanvasLayout,
    retry: RetryConfig,
    request_timeout: Duration,
    quota_exhausted: AtomicBool,
}

impl OutpaintAdapter {
    /// `backend` is `None` when no credentials are configured.
    pub fn new(
        backend: Option<Arc<dyn OutpaintBackend>>,
        config: &OutpaintConfig,
        layout: CanvasLayout,
    ) -> Self {
        Self {
            backend,
            layout,
            retry: RetryConfig::new("outpaint")
                .with_max_attempts(config.max_retries)
                .with_base_delay(config.initial_backoff),
            request_timeout: config.request_timeout,
            quota_exhausted: AtomicBool::new(false),
        }
    }

    pub fn layout(&self) -> &CanvasLayout {
        &self.layout
    }

    /// Whether quota exhaustion has been observed during this job.
    pub fn quota_exhausted(&self) -> bool {
        self.quota_exhausted.load(Ordering::SeqCst)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    /// Produce the extension for one sampled frame.
    ///
    /// Fails only with [`WorkerError::Cancelled`] (cancellation observed
    /// before an attempt) or an internal task failure.
    pub async fn extend(
        &self,
        frame: &Frame,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<ExtensionResult> {
        let backend = match &self.backend {
            Some(backend) => backend.clone(),
            None => return self.fallback(frame, 0, DegradeReason::NoCredentials).await,
        };
        if self.quota_exhausted() {
            return self.fallback(frame, 0, DegradeReason::QuotaExhausted).await;
        }
        if is_cancelled(cancel) {
            return Err(WorkerError::Cancelled);
        }

        let seed = self.seed(frame).await?;
        let request = OutpaintRequest {
            frame_index: frame.index,
            canvas: seed.canvas.clone(),
            prompt: seed.prompt.clone(),
        };

        let attempts = AtomicU32::new(0);
        let outcome = retry_async(
            &self.retry,
            |e: &AttemptError| matches!(e, AttemptError::Backend(e) if e.is_retryable()),
            || self.attempt(backend.as_ref(), &request, cancel, &attempts),
        )
        .await;
        let attempts = attempts.load(Ordering::SeqCst);

        let error = match outcome {
            RetryResult::Success { value, .. } => {
                let layout = self.layout;
                let cut = tokio::task::spawn_blocking(move || cut_bands(&value, &layout))
                    .await
                    .map_err(|e| WorkerError::internal(format!("band cut task failed: {}", e)))?;
                return match cut {
                    Ok((top, bottom)) => Ok(ExtensionResult::ai(frame.index, top, bottom, attempts)),
                    Err(e) => Ok(Self::seeded_fallback(
                        frame.index,
                        &seed,
                        attempts,
                        DegradeReason::Rejected {
                            message: e.to_string(),
                        },
                    )),
                };
            }
            RetryResult::Failed { error, .. } => error,
        };

        let reason = match error {
            AttemptError::Cancelled => return Err(WorkerError::Cancelled),
            AttemptError::QuotaFlagged => DegradeReason::QuotaExhausted,
            AttemptError::Backend(e) => match e.kind() {
                FailureKind::QuotaExhausted => {
                    if !self.quota_exhausted.swap(true, Ordering::SeqCst) {
                        metrics::record_quota_exhausted();
                        warn!(
                            frame = frame.index,
                            "Outpainting quota exhausted, remaining frames use the local fallback: {}",
                            e
                        );
                    }
                    DegradeReason::QuotaExhausted
                }
                FailureKind::Rejected => {
                    warn!(frame = frame.index, "Outpainting rejected frame: {}", e);
                    DegradeReason::Rejected {
                        message: e.to_string(),
                    }
                }
                FailureKind::Transient => {
                    warn!(
                        frame = frame.index,
                        attempts, "Outpainting failed after retries: {}", e
                    );
                    DegradeReason::RetriesExhausted {
                        attempts,
                        last_error: e.to_string(),
                    }
                }
            },
        };

        Ok(Self::seeded_fallback(frame.index, &seed, attempts, reason))
    }

    async fn attempt(
        &self,
        backend: &dyn OutpaintBackend,
        request: &OutpaintRequest,
        cancel: &watch::Receiver<bool>,
        attempts: &AtomicU32,
    ) -> Result<RgbImage, AttemptError> {
        if is_cancelled(cancel) {
            return Err(AttemptError::Cancelled);
        }
        if self.quota_exhausted() {
            return Err(AttemptError::QuotaFlagged);
        }

        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            frame = request.frame_index,
            attempt,
            backend = backend.name(),
            "Outpaint attempt"
        );

        let result = match tokio::time::timeout(self.request_timeout, backend.outpaint(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(OutpaintError::Timeout(self.request_timeout.as_secs())),
        };

        match result {
            Ok(image) => {
                metrics::record_outpaint_attempt("success");
                Ok(image)
            }
            Err(e) => {
                metrics::record_outpaint_attempt(e.kind().as_str());
                Err(AttemptError::Backend(e))
            }
        }
    }

    /// Build the fallback bands and the seed canvas for a remote call.
    async fn seed(&self, frame: &Frame) -> WorkerResult<Seed> {
        let image = frame.image.clone();
        let layout = self.layout;
        let index = frame.index;

        tokio::task::spawn_blocking(move || {
            let (top, bottom) = fallback_bands(&image, &layout, index)?;
            let canvas = compose_canvas(&image, &top, &bottom, &layout)
                .map_err(|e| WorkerError::compose(index, e.to_string()))?;
            Ok(Seed {
                top: Arc::new(top),
                bottom: Arc::new(bottom),
                canvas: Arc::new(canvas),
                prompt: derive_prompt(average_color(&image)),
            })
        })
        .await
        .map_err(|e| WorkerError::internal(format!("seed task failed: {}", e)))?
    }

    fn seeded_fallback(
        index: u64,
        seed: &Seed,
        attempts: u32,
        reason: DegradeReason,
    ) -> ExtensionResult {
        ExtensionResult::fallback(index, seed.top.clone(), seed.bottom.clone(), attempts, reason)
    }

    /// Local fallback without any remote attempt.
    async fn fallback(
        &self,
        frame: &Frame,
        attempts: u32,
        reason: DegradeReason,
    ) -> WorkerResult<ExtensionResult> {
        let image = frame.image.clone();
        let layout = self.layout;
        let index = frame.index;
        let (top, bottom) =
            tokio::task::spawn_blocking(move || fallback_bands(&image, &layout, index))
                .await
                .map_err(|e| WorkerError::internal(format!("fallback task failed: {}", e)))??;

        Ok(ExtensionResult::fallback(
            frame.index,
            Arc::new(top),
            Arc::new(bottom),
            attempts,
            reason,
        ))
    }
}

/// Mirror bands at canvas width, built from the frame widened to the canvas.
fn fallback_bands(
    image: &RgbImage,
    layout: &CanvasLayout,
    index: u64,
) -> WorkerResult<(RgbImage, RgbImage)> {
    let widened =
        widen_to_canvas(image, layout).map_err(|e| WorkerError::compose(index, e.to_string()))?;
    Ok(rayon::join(
        || mirror_extension(&widened, BandPosition::Top, layout.top),
        || mirror_extension(&widened, BandPosition::Bottom, layout.bottom),
    ))
}
