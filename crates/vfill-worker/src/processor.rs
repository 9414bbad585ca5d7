//! Job processor: decode, sample, outpaint, interpolate, reassemble.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};

use vfill_media::{decode_video, discard_partial, partial_path, FrameEncoder, FrameSink, SourceVideo};
use vfill_models::{
    output_file_name, DegradeReason, ExtensionStatus, JobId, JobState, JobStats,
    ProcessingOptions, VideoJob,
};
use vfill_outpaint::{OutpaintBackend, OutpaintConfig, ReplicateClient};

use crate::adapter::OutpaintAdapter;
use crate::cancel::{cancelled, is_cancelled};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::extension::ExtensionResult;
use crate::interpolator::Interpolator;
use crate::logging::JobLogger;
use crate::metrics;
use crate::reassembler::Reassembler;
use crate::sampler::sample_video;

/// Result of a finished job.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub output_path: PathBuf,
    pub stats: JobStats,
}

/// Runs conversion jobs against one outpainting backend.
pub struct VideoProcessor {
    config: WorkerConfig,
    outpaint: OutpaintConfig,
    backend: Option<Arc<dyn OutpaintBackend>>,
}

impl VideoProcessor {
    /// Build a processor using the Replicate client when a token is configured.
    /// Without one every job runs on the local fallback.
    pub fn new(config: WorkerConfig, outpaint: OutpaintConfig) -> WorkerResult<Self> {
        let backend: Option<Arc<dyn OutpaintBackend>> = if outpaint.has_credentials() {
            let client = ReplicateClient::new(outpaint.clone())
                .map_err(|e| WorkerError::config_error(e.to_string()))?;
            Some(Arc::new(client))
        } else {
            warn!("REPLICATE_API_TOKEN not set, outpainting will use the local fallback only");
            None
        };
        Ok(Self::with_backend(config, outpaint, backend))
    }

    pub fn with_backend(
        config: WorkerConfig,
        outpaint: OutpaintConfig,
        backend: Option<Arc<dyn OutpaintBackend>>,
    ) -> Self {
        Self {
            config,
            outpaint,
            backend,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Run one job end to end and write `<stem>_vertical.mp4` into the job's
    /// output directory.
    ///
    /// The job state is updated on completion. On any failure the partial
    /// output is removed.
    pub async fn process(
        &self,
        job: &mut VideoJob,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<JobOutput> {
        let logger = JobLogger::new(&job.id, &job.options);
        let span = logger.span();
        let started = Instant::now();
        let output_path = job.output_dir.join(output_file_name(&job.input_path));

        job.start();
        logger.started(&job.input_path);

        let timeout = self.config.job_timeout;
        let run = self.run(job, &output_path, &cancel, &logger).instrument(span);
        let result = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(timeout.as_secs())),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(mut stats) => {
                stats.processing_time_ms = elapsed.as_millis() as u64;
                logger.warnings(&stats);
                logger.completed(&stats, elapsed);
                job.finish(JobState::Completed, None);
                let outcome = if stats.degraded { "degraded" } else { "success" };
                metrics::record_job(outcome, elapsed.as_secs_f64());
                Ok(JobOutput { output_path, stats })
            }
            Err(e) => {
                discard_partial(partial_path(&output_path)).await;
                let state = if e.is_cancelled() {
                    JobState::Cancelled
                } else {
                    JobState::Failed
                };
                logger.failed(&e);
                job.finish(state, Some(e.to_string()));
                metrics::record_job(state.as_str(), elapsed.as_secs_f64());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job: &VideoJob,
        output_path: &Path,
        cancel: &watch::Receiver<bool>,
        logger: &JobLogger,
    ) -> WorkerResult<JobStats> {
        logger.stage("decode", &job.input_path.display().to_string());
        let video = decode_video(&job.input_path, Some(cancel.clone())).await?;
        let layout = video.layout()?;

        logger.stage(
            "encode",
            &format!(
                "{} frames, {}x{} -> {}x{} at {} fps",
                video.frame_count(),
                layout.source_width,
                layout.source_height,
                layout.width,
                layout.height,
                video.info.frame_rate
            ),
        );
        let audio = video.info.has_audio.then_some(job.input_path.as_path());
        let mut encoder = FrameEncoder::open(
            layout,
            video.info.frame_rate,
            output_path,
            audio,
            &self.config.encoding,
        )
        .await?;

        self.process_video(&job.id, &job.options, &video, &mut encoder, cancel)
            .await
    }

    /// Extend and reassemble an already decoded video into `sink`.
    ///
    /// `processing_time_ms` is left for the caller to fill in.
    pub async fn process_video(
        &self,
        job_id: &JobId,
        options: &ProcessingOptions,
        video: &SourceVideo,
        sink: &mut dyn FrameSink,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<JobStats> {
        let logger = JobLogger::new(job_id, options);

        let prepared = async {
            let layout = video.layout()?;
            let samples = self.extend_samples(&logger, options, video, cancel).await?;
            let stats = summarize(video.frame_count(), &samples);
            let interpolator = Interpolator::new(video.frame_count(), samples)?;
            Ok::<_, WorkerError>((layout, stats, Arc::new(interpolator)))
        }
        .await;
        let (layout, mut stats, interpolator) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                sink.abort().await;
                return Err(e);
            }
        };

        logger.stage("reassemble", &format!("{} frames", video.frame_count()));
        let written = Reassembler::new(layout)
            .reassemble(video, interpolator, sink, cancel)
            .await?;
        stats.total_frames = written;

        metrics::record_frames(ExtensionStatus::AiGenerated, stats.ai_generated);
        metrics::record_frames(ExtensionStatus::FallbackGenerated, stats.fallback_generated);
        metrics::record_frames(ExtensionStatus::Interpolated, stats.interpolated);

        Ok(stats)
    }

    /// Outpaint every sampled frame and return the results ordered by index.
    async fn extend_samples(
        &self,
        logger: &JobLogger,
        options: &ProcessingOptions,
        video: &SourceVideo,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<Vec<ExtensionResult>> {
        let layout = video.layout()?;
        let indices = sample_video(video, options)?;
        logger.stage(
            "outpaint",
            &format!(
                "{} of {} frames sampled ({} mode)",
                indices.len(),
                video.frame_count(),
                options.mode.as_str()
            ),
        );

        let adapter = Arc::new(OutpaintAdapter::new(
            self.backend.clone(),
            &self.outpaint,
            layout,
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.max_outpaint_parallel.max(1)));
        let mut tasks = JoinSet::new();
        let mut cancel_wait = cancel.clone();

        for (slot, &index) in indices.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_wait) => break,
                permit = semaphore.clone().acquire_owned() => permit
                    .map_err(|_| WorkerError::internal("outpaint semaphore closed"))?,
            };
            let frame = video
                .frame(index)
                .cloned()
                .ok_or_else(|| WorkerError::interpolation(index, "sampled frame missing"))?;
            let adapter = adapter.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = permit;
                (slot, adapter.extend(&frame, &cancel).await)
            });
        }

        let mut slots: Vec<Option<ExtensionResult>> = vec![None; indices.len()];
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(result))) => slots[slot] = Some(result),
                Ok((_, Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(WorkerError::internal(format!(
                        "outpaint task failed: {}",
                        e
                    )));
                }
            }
        }

        if is_cancelled(cancel) {
            return Err(WorkerError::Cancelled);
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if adapter.quota_exhausted() {
            warn!("Outpainting quota was exhausted during the job");
        }

        let results: Vec<ExtensionResult> = slots
            .into_iter()
            .zip(&indices)
            .map(|(slot, &index)| {
                slot.ok_or_else(|| WorkerError::interpolation(index, "missing extension"))
            })
            .collect::<WorkerResult<_>>()?;

        info!(
            sampled = results.len(),
            attempts = results.iter().map(|r| r.attempts as u64).sum::<u64>(),
            "Outpainting finished"
        );
        Ok(results)
    }
}

/// Build job statistics from the sampled results.
fn summarize(frame_count: u64, samples: &[ExtensionResult]) -> JobStats {
    let mut stats = JobStats {
        total_frames: frame_count,
        sampled_frames: samples.len() as u64,
        interpolated: frame_count.saturating_sub(samples.len() as u64),
        ..Default::default()
    };

    let mut no_credentials = 0u64;
    let mut quota = 0u64;
    let mut retries = 0u64;
    let mut rejected = 0u64;
    let mut last_errors = BTreeMap::new();

    for sample in samples {
        stats.record(sample.status);
        stats.api_calls += sample.attempts as u64;

        match &sample.degrade_reason {
            None => {}
            Some(DegradeReason::NoCredentials) => no_credentials += 1,
            Some(DegradeReason::QuotaExhausted) => quota += 1,
            Some(DegradeReason::RetriesExhausted { last_error, .. }) => {
                retries += 1;
                last_errors.insert("retries", last_error.clone());
            }
            Some(DegradeReason::Rejected { message }) => {
                rejected += 1;
                last_errors.insert("rejected", message.clone());
            }
        }
        if let Some(reason) = &sample.degrade_reason {
            if reason.is_service_degradation() {
                stats.degraded = true;
            }
        }
    }

    if no_credentials > 0 {
        stats.warn("No outpainting API token configured; extensions use the local fallback");
    }
    if quota > 0 {
        stats.warn(format!(
            "Outpainting quota exhausted; {} frame(s) used the local fallback",
            quota
        ));
    }
    if retries > 0 {
        stats.warn(format!(
            "Outpainting service unavailable for {} frame(s), local fallback used (last error: {})",
            retries,
            last_errors.get("retries").map(String::as_str).unwrap_or("unknown")
        ));
    }
    if rejected > 0 {
        stats.warn(format!(
            "Outpainting rejected {} frame(s), local fallback used (last error: {})",
            rejected,
            last_errors.get("rejected").map(String::as_str).unwrap_or("unknown")
        ));
    }

    stats
}
