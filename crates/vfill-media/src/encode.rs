//! Encode composited canvases into the output MP4.

use async_trait::async_trait;
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use vfill_models::{CanvasLayout, EncodingConfig};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{discard_partial, move_file, partial_path};
use crate::probe::FrameRate;
use crate::progress::{EncodeProgress, ProgressLine};

/// Stderr lines kept for error reports.
const STDERR_TAIL: usize = 20;

/// Destination for composited frames, consumed in output order.
#[async_trait]
pub trait FrameSink: Send {
    /// Append one canvas-sized frame.
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()>;

    /// Flush and close the sink, returning the number of frames written.
    async fn finish(&mut self) -> MediaResult<u64>;

    /// Tear the sink down after a failure, leaving no partial output.
    async fn abort(&mut self) {}
}

/// FFmpeg-backed H.264 encoder reading raw RGB24 frames from stdin.
pub struct FrameEncoder {
    layout: CanvasLayout,
    output: PathBuf,
    partial: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<VecDeque<String>>>,
    frames_written: u64,
}

impl FrameEncoder {
    /// Spawn the encoder.
    ///
    /// Frames go to a partial file next to `output`; it is renamed into place
    /// by [`FrameSink::finish`]. When `audio_source` is given and the config
    /// keeps audio, its first audio stream (if any) is muxed in.
    pub async fn open(
        layout: CanvasLayout,
        frame_rate: FrameRate,
        output: impl AsRef<Path>,
        audio_source: Option<&Path>,
        config: &EncodingConfig,
    ) -> MediaResult<Self> {
        let output = output.as_ref().to_path_buf();
        let partial = partial_path(&output);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut cmd =
            FfmpegCommand::encode_from_raw_rgb(layout.width, layout.height, frame_rate, &partial);
        match audio_source {
            Some(source) if config.keep_audio => {
                cmd = cmd
                    .extra_input(Vec::<String>::new(), source)
                    .map("0:v:0")
                    .map("1:a:0?")
                    .output_args(config.video_args())
                    .output_args(config.audio_args());
            }
            _ => {
                cmd = cmd.output_args(config.video_args()).output_arg("-an");
            }
        }

        let mut child = cmd
            .to_command()?
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MediaError::encode_failed(format!("Failed to spawn FFmpeg: {}", e), None)
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::encode_failed("Failed to open encoder stdin", None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::encode_failed("Failed to open encoder stderr", None))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut progress = EncodeProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);

            while let Ok(Some(line)) = lines.next_line().await {
                match progress.feed(&line) {
                    ProgressLine::Report(report) => {
                        debug!(
                            frame = report.frame,
                            fps = report.fps,
                            speed = report.speed,
                            "Encoding progress"
                        );
                        continue;
                    }
                    ProgressLine::Field => continue,
                    ProgressLine::Other => {}
                }
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        debug!(
            width = layout.width,
            height = layout.height,
            frame_rate = %frame_rate,
            "Opened encoder for {}",
            output.display()
        );

        Ok(Self {
            layout,
            output,
            partial,
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            frames_written: 0,
        })
    }

    /// Final output path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    async fn collect_stderr(&mut self) -> Option<String> {
        let task = self.stderr_task.take()?;
        let tail = task.await.ok()?;
        if tail.is_empty() {
            None
        } else {
            Some(Vec::from(tail).join("\n"))
        }
    }

    /// Wait for the encoder after a failed write and build the error.
    async fn encoder_died(&mut self, message: String) -> MediaError {
        self.stdin.take();
        let exit = match self.child.as_mut() {
            Some(child) => child.wait().await.ok().and_then(|s| s.code()),
            None => None,
        };
        self.child.take();
        let stderr = self.collect_stderr().await;
        discard_partial(&self.partial).await;
        MediaError::encode_failed(format!("{} (exit code {:?})", message, exit), stderr)
    }
}

#[async_trait]
impl FrameSink for FrameEncoder {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        if frame.width() != self.layout.width || frame.height() != self.layout.height {
            return Err(MediaError::geometry(format!(
                "frame {} is {}x{}, canvas is {}x{}",
                self.frames_written,
                frame.width(),
                frame.height(),
                self.layout.width,
                self.layout.height
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::encode_failed("Encoder already closed", None))?;

        if let Err(e) = stdin.write_all(frame.as_raw()).await {
            let message = format!("Encoder stopped accepting frames at frame {}: {}", self.frames_written, e);
            return Err(self.encoder_died(message).await);
        }

        self.frames_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<u64> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!("Encoder stdin shutdown: {}", e);
            }
        }

        let mut child = self
            .child
            .take()
            .ok_or_else(|| MediaError::encode_failed("Encoder already finished", None))?;
        let status = child.wait().await?;
        let stderr = self.collect_stderr().await;

        if !status.success() {
            discard_partial(&self.partial).await;
            return Err(MediaError::encode_failed(
                format!("FFmpeg exited with {:?}", status.code()),
                stderr,
            ));
        }

        if let Err(e) = move_file(&self.partial, &self.output).await {
            discard_partial(&self.partial).await;
            return Err(e);
        }

        info!(
            frames = self.frames_written,
            "Encoded {}",
            self.output.display()
        );
        Ok(self.frames_written)
    }

    async fn abort(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        discard_partial(&self.partial).await;
    }
}

/// Sink that keeps frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<RgbImage>,
    pub finished: bool,
    pub aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        if self.finished {
            return Err(MediaError::internal("write after finish"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<u64> {
        self.finished = true;
        Ok(self.frames.len() as u64)
    }

    async fn abort(&mut self) {
        self.aborted = true;
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_counts_frames() {
        let mut sink = MemorySink::new();
        let frame = RgbImage::new(4, 8);
        sink.write_frame(&frame).await.unwrap();
        sink.write_frame(&frame).await.unwrap();
        assert_eq!(sink.finish().await.unwrap(), 2);
        assert!(sink.write_frame(&frame).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_encoder_writes_exact_frame_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("clip_vertical.mp4");
        let layout = CanvasLayout::vertical(64, 36).unwrap();
        let rate = FrameRate::new(30000, 1001);

        let mut encoder = FrameEncoder::open(layout, rate, &output, None, &EncodingConfig::default())
            .await
            .unwrap();
        let canvas = RgbImage::from_pixel(layout.width, layout.height, image::Rgb([10, 120, 200]));
        for _ in 0..12 {
            encoder.write_frame(&canvas).await.unwrap();
        }
        assert_eq!(encoder.finish().await.unwrap(), 12);
        assert!(output.exists());
        assert!(!partial_path(&output).exists());

        let info = crate::probe::probe_video(&output).await.unwrap();
        assert_eq!(info.width, layout.width);
        assert_eq!(info.height, layout.height);
        assert_eq!(info.frame_rate, rate);
        assert_eq!(info.frame_count, Some(12));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_wrong_frame_size_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("bad_vertical.mp4");
        let layout = CanvasLayout::vertical(64, 36).unwrap();

        let mut encoder = FrameEncoder::open(layout, FrameRate::new(30, 1), &output, None, &EncodingConfig::default())
            .await
            .unwrap();
        let err = encoder.write_frame(&RgbImage::new(64, 36)).await.unwrap_err();
        assert!(matches!(err, MediaError::Geometry(_)));

        encoder.abort().await;
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }
}
