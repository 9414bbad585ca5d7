//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Exact rational frame rate (`num / den` frames per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Frames per second as a decimal.
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Presentation timestamp of frame `index`, in seconds.
    pub fn timestamp(&self, index: u64) -> f64 {
        index as f64 * self.den as f64 / self.num as f64
    }

    /// Duration of `frames` frames, in seconds.
    pub fn duration_of(&self, frames: u64) -> f64 {
        self.timestamp(frames)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for FrameRate {
    type Err = MediaError;

    /// Parse "30/1", "30000/1001" or a decimal such as "25".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MediaError::invalid_video(format!("Invalid frame rate: {}", s));

        if let Some((num, den)) = s.split_once('/') {
            let num: u32 = num.trim().parse().map_err(|_| invalid())?;
            let den: u32 = den.trim().parse().map_err(|_| invalid())?;
            if num == 0 || den == 0 {
                return Err(invalid());
            }
            return Ok(Self { num, den });
        }

        let fps: f64 = s.trim().parse().map_err(|_| invalid())?;
        if !(fps.is_finite() && fps > 0.0) {
            return Err(invalid());
        }
        // Decimal rates are kept to millisecond-frame precision
        Ok(Self {
            num: (fps * 1000.0).round() as u32,
            den: 1000,
        })
    }
}

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Container duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Exact frame rate
    pub frame_rate: FrameRate,
    /// Video codec
    pub codec: String,
    /// Frame count reported by the container, if any
    pub frame_count: Option<u64>,
    /// Whether the file carries an audio stream
    pub has_audio: bool,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::invalid_video("Video stream has no dimensions"));
    }

    // avg_frame_rate is "0/0" for some containers; fall back to r_frame_rate
    let frame_rate = [&video_stream.avg_frame_rate, &video_stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|r| r.parse::<FrameRate>().ok())
        .ok_or_else(|| MediaError::invalid_video("Video stream has no usable frame rate"))?;

    Ok(VideoInfo {
        duration: probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0),
        width,
        height,
        frame_rate,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        frame_count: video_stream
            .nb_frames
            .as_ref()
            .and_then(|n| n.parse::<u64>().ok()),
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
        size: probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0),
    })
}
