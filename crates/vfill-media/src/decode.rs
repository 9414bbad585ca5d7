//! Decode a source video into in-memory RGB frames.

use image::RgbImage;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vfill_models::is_allowed_container;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, SourceVideo};
use crate::probe::probe_video;

/// Upper bound on frames preallocated from the container's `nb_frames`.
const MAX_PREALLOCATED_FRAMES: usize = 10_000;

/// Container frame counts are untrusted; only a bounded amount is reserved.
fn initial_capacity(reported: Option<u64>) -> usize {
    reported
        .map(|n| n.min(MAX_PREALLOCATED_FRAMES as u64) as usize)
        .unwrap_or(0)
}

/// Decode every frame of `path` as packed RGB24.
///
/// Fails with [`MediaError::InvalidVideo`] when the container is not
/// allow-listed, the file cannot be probed or decoded, or it yields no frames.
/// Cancellation is checked between frames.
pub async fn decode_video(
    path: impl AsRef<Path>,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<SourceVideo> {
    let path = path.as_ref();

    if !is_allowed_container(path) {
        return Err(MediaError::invalid_video(format!(
            "Unsupported container: {}",
            path.display()
        )));
    }

    let info = match probe_video(path).await {
        Ok(info) => info,
        Err(MediaError::FfprobeFailed { stderr, .. }) => {
            debug!("ffprobe stderr: {}", stderr.unwrap_or_default());
            return Err(MediaError::invalid_video(format!(
                "Unreadable video: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e),
    };

    let frame_bytes = info.width as usize * info.height as usize * 3;
    let mut child = FfmpegCommand::decode_to_raw_rgb(path)
        .to_command()?
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::internal("Failed to capture FFmpeg stdout"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("Failed to capture FFmpeg stderr"))?;

    // Drain stderr concurrently so a chatty decoder cannot block on a full pipe
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let mut reader = BufReader::with_capacity(frame_bytes.max(8192), stdout);
    let mut frames = Vec::with_capacity(initial_capacity(info.frame_count));

    loop {
        if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            let _ = child.kill().await;
            return Err(MediaError::Cancelled);
        }

        let mut buf = vec![0u8; frame_bytes];
        match reader.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let image = RgbImage::from_raw(info.width, info.height, buf)
            .ok_or_else(|| MediaError::internal("Raw frame buffer has the wrong size"))?;
        let index = frames.len() as u64;
        frames.push(Frame::new(index, info.frame_rate.timestamp(index), image));
    }

    let status = child.wait().await?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        warn!(
            exit_code = ?status.code(),
            "FFmpeg decode failed for {}",
            path.display()
        );
        return Err(MediaError::invalid_video(format!(
            "Could not decode {}: {}",
            path.display(),
            stderr.lines().last().unwrap_or("unknown decoder error")
        )));
    }

    if frames.is_empty() {
        return Err(MediaError::invalid_video(format!(
            "No frames decoded from {}",
            path.display()
        )));
    }

    info!(
        frames = frames.len(),
        width = info.width,
        height = info.height,
        frame_rate = %info.frame_rate,
        "Decoded {}",
        path.display()
    );

    Ok(SourceVideo::new(info, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preallocation_is_capped() {
        assert_eq!(initial_capacity(None), 0);
        assert_eq!(initial_capacity(Some(300)), 300);
        assert_eq!(initial_capacity(Some(u64::MAX)), MAX_PREALLOCATED_FRAMES);
    }

    #[tokio::test]
    async fn test_rejects_disallowed_container() {
        let err = decode_video("/tmp/clip.mkv", None).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_input() {
        let err = decode_video("/nonexistent/clip.mp4", None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_garbage_file_is_invalid_video() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.mp4");
        tokio::fs::write(&path, b"definitely not a video").await.unwrap();

        match decode_video(&path, None).await {
            Err(MediaError::FfprobeNotFound) | Err(MediaError::FfmpegNotFound) => {}
            Err(e) => assert!(e.is_invalid_input(), "unexpected error: {e}"),
            Ok(_) => panic!("garbage decoded as video"),
        }
    }
}
