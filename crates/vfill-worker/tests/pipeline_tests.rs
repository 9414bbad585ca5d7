//! End-to-end pipeline tests over synthetic in-memory videos.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tokio::sync::{watch, Semaphore};

use vfill_media::{Frame, FrameRate, MemorySink, SourceVideo, VideoInfo};
use vfill_models::{JobId, ProcessingOptions};
use vfill_outpaint::{OutpaintBackend, OutpaintConfig, OutpaintError, OutpaintRequest, OutpaintResult};
use vfill_worker::{VideoProcessor, WorkerConfig, WorkerError};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 18;

fn synthetic_video(frames: u64) -> SourceVideo {
    let rate = FrameRate::new(30, 1);
    let info = VideoInfo {
        duration: rate.duration_of(frames),
        width: WIDTH,
        height: HEIGHT,
        frame_rate: rate,
        codec: "h264".to_string(),
        frame_count: Some(frames),
        has_audio: false,
        size: 0,
    };
    let frames = (0..frames)
        .map(|i| {
            let shade = (i * 8 % 256) as u8;
            Frame::new(
                i,
                rate.timestamp(i),
                RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([shade, 64, 255 - shade])),
            )
        })
        .collect();
    SourceVideo::new(info, frames)
}

enum Behavior {
    Succeed,
    Transient,
    Quota,
}

struct CountingBackend {
    calls: AtomicU32,
    behavior: Behavior,
}

impl CountingBackend {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            behavior,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutpaintBackend for CountingBackend {
    async fn outpaint(&self, request: &OutpaintRequest) -> OutpaintResult<RgbImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(RgbImage::from_pixel(
                request.canvas.width(),
                request.canvas.height(),
                Rgb([10, 200, 10]),
            )),
            Behavior::Transient => Err(OutpaintError::ServiceUnavailable {
                status: 503,
                message: "unavailable".into(),
            }),
            Behavior::Quota => Err(OutpaintError::QuotaExhausted("insufficient credit".into())),
        }
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn processor(backend: Option<Arc<CountingBackend>>, max_retries: u32) -> VideoProcessor {
    let outpaint = OutpaintConfig::default()
        .with_max_retries(max_retries)
        .with_backoff(Duration::from_millis(1));
    let backend = backend.map(|b| b as Arc<dyn OutpaintBackend>);
    VideoProcessor::with_backend(
        WorkerConfig::default().with_max_outpaint_parallel(2),
        outpaint,
        backend,
    )
}

async fn run(
    processor: &VideoProcessor,
    video: &SourceVideo,
    options: ProcessingOptions,
) -> (Result<vfill_models::JobStats, WorkerError>, MemorySink) {
    let (_tx, rx) = watch::channel(false);
    let mut sink = MemorySink::new();
    let result = processor
        .process_video(&JobId::new(), &options, video, &mut sink, &rx)
        .await;
    (result, sink)
}

#[tokio::test]
async fn test_output_frame_count_and_duration_match_source() {
    let video = synthetic_video(30);
    let backend = CountingBackend::new(Behavior::Succeed);
    let (result, sink) = run(
        &processor(Some(backend.clone()), 3),
        &video,
        ProcessingOptions::keyframes(10),
    )
    .await;
    let stats = result.unwrap();

    assert_eq!(sink.frames.len(), 30);
    assert_eq!(stats.total_frames, 30);
    assert_eq!(
        video.info.frame_rate.duration_of(sink.frames.len() as u64),
        video.duration()
    );

    let layout = video.layout().unwrap();
    for frame in &sink.frames {
        assert_eq!(frame.dimensions(), (layout.width, layout.height));
    }
}

#[tokio::test]
async fn test_every_frame_gets_one_extension() {
    let video = synthetic_video(30);
    let backend = CountingBackend::new(Behavior::Succeed);
    let (result, _) = run(
        &processor(Some(backend.clone()), 3),
        &video,
        ProcessingOptions::keyframes(10),
    )
    .await;
    let stats = result.unwrap();

    assert_eq!(stats.sampled_frames, 4);
    assert_eq!(stats.ai_generated, 4);
    assert_eq!(stats.interpolated, 26);
    assert_eq!(stats.extended_frames(), 30);
    assert_eq!(backend.calls(), 4);
    assert_eq!(stats.api_calls, 4);
    assert!(!stats.degraded);
}

#[tokio::test]
async fn test_transient_backend_capped_at_max_retries() {
    let video = synthetic_video(5);
    let backend = CountingBackend::new(Behavior::Transient);
    let (result, sink) = run(
        &processor(Some(backend.clone()), 3),
        &video,
        ProcessingOptions::full(),
    )
    .await;
    let stats = result.unwrap();

    assert_eq!(backend.calls(), 5 * 3);
    assert_eq!(stats.fallback_generated, 5);
    assert_eq!(stats.ai_generated, 0);
    assert!(stats.degraded);
    assert!(!stats.warnings.is_empty());
    assert_eq!(sink.frames.len(), 5);
}

#[tokio::test]
async fn test_no_credentials_makes_zero_calls() {
    let video = synthetic_video(6);
    let (result, sink) = run(&processor(None, 3), &video, ProcessingOptions::full()).await;
    let stats = result.unwrap();

    assert_eq!(stats.fallback_generated, 6);
    assert_eq!(stats.api_calls, 0);
    assert!(!stats.degraded);
    assert_eq!(stats.warnings.len(), 1);
    assert_eq!(sink.frames.len(), 6);
}

#[tokio::test]
async fn test_quota_exhaustion_short_circuits_job() {
    let video = synthetic_video(12);
    let backend = CountingBackend::new(Behavior::Quota);
    let outpaint = OutpaintConfig::default()
        .with_max_retries(3)
        .with_backoff(Duration::from_millis(1));
    // One call in flight at a time so the flag is observed by every later frame
    let processor = VideoProcessor::with_backend(
        WorkerConfig::default().with_max_outpaint_parallel(1),
        outpaint,
        Some(backend.clone() as Arc<dyn OutpaintBackend>),
    );

    let (result, sink) = run(&processor, &video, ProcessingOptions::full()).await;
    let stats = result.unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(stats.fallback_generated, 12);
    assert!(stats.degraded);
    assert_eq!(sink.frames.len(), 12);
}

#[tokio::test]
async fn test_interval_one_matches_full_mode() {
    let video = synthetic_video(8);

    let (full, full_sink) = run(&processor(None, 1), &video, ProcessingOptions::full()).await;
    let (keyed, keyed_sink) =
        run(&processor(None, 1), &video, ProcessingOptions::keyframes(1)).await;

    let (full, keyed) = (full.unwrap(), keyed.unwrap());
    assert_eq!(full.sampled_frames, keyed.sampled_frames);
    assert_eq!(keyed.interpolated, 0);
    assert_eq!(full_sink.frames, keyed_sink.frames);
}

#[tokio::test]
async fn test_source_frame_is_preserved_in_canvas() {
    let video = synthetic_video(3);
    let layout = video.layout().unwrap();
    let (result, sink) = run(&processor(None, 1), &video, ProcessingOptions::full()).await;
    result.unwrap();

    for (frame, canvas) in video.frames.iter().zip(&sink.frames) {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                assert_eq!(
                    canvas.get_pixel(x + layout.frame_x(), y + layout.frame_y()),
                    frame.image.get_pixel(x, y)
                );
            }
        }
    }
}

#[tokio::test]
async fn test_cancelled_job_writes_nothing() {
    let video = synthetic_video(10);
    let backend = CountingBackend::new(Behavior::Succeed);
    let processor = processor(Some(backend.clone()), 3);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let mut sink = MemorySink::new();

    let err = processor
        .process_video(&JobId::new(), &ProcessingOptions::full(), &video, &mut sink, &rx)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(backend.calls(), 0);
    assert!(sink.aborted);
    assert!(sink.frames.is_empty());
}

/// Backend whose calls block until the test opens the gate.
struct GatedBackend {
    started: AtomicU32,
    completed: AtomicU32,
    gate: Semaphore,
}

#[async_trait]
impl OutpaintBackend for GatedBackend {
    async fn outpaint(&self, request: &OutpaintRequest) -> OutpaintResult<RgbImage> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _pass = self
            .gate
            .acquire()
            .await
            .map_err(|_| OutpaintError::ServiceUnavailable {
                status: 503,
                message: "gate closed".into(),
            })?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(RgbImage::from_pixel(
            request.canvas.width(),
            request.canvas.height(),
            Rgb([10, 200, 10]),
        ))
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[tokio::test]
async fn test_cancel_during_calls_lets_in_flight_finish() {
    let video = synthetic_video(10);
    let backend = Arc::new(GatedBackend {
        started: AtomicU32::new(0),
        completed: AtomicU32::new(0),
        gate: Semaphore::new(0),
    });
    let parallel = 2;
    let processor = VideoProcessor::with_backend(
        WorkerConfig::default().with_max_outpaint_parallel(parallel),
        OutpaintConfig::default().with_max_retries(3),
        Some(backend.clone() as Arc<dyn OutpaintBackend>),
    );
    let (tx, rx) = watch::channel(false);
    let mut sink = MemorySink::new();

    let job_id = JobId::new();
    let options = ProcessingOptions::full();
    let job = processor.process_video(
        &job_id,
        &options,
        &video,
        &mut sink,
        &rx,
    );
    let control = async {
        while backend.started.load(Ordering::SeqCst) < parallel as u32 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tx.send(true).unwrap();
        // Give the fan-out loop a chance to observe the flag before calls return
        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    };
    let (result, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(job, control)
    })
    .await
    .unwrap();

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(backend.started.load(Ordering::SeqCst), parallel as u32);
    assert_eq!(backend.completed.load(Ordering::SeqCst), parallel as u32);
    assert!(sink.aborted);
    assert!(sink.frames.is_empty());
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let video = synthetic_video(4);
    let (result, sink) = run(&processor(None, 1), &video, ProcessingOptions::keyframes(0)).await;
    assert!(matches!(result, Err(WorkerError::InvalidOptions(_))));
    assert!(sink.frames.is_empty());
}
