//! FFmpeg command builder.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::probe::FrameRate;

/// Stand-in path for FFmpeg's stdin/stdout pipes.
pub const PIPE: &str = "-";

#[derive(Debug, Clone)]
struct InputSpec {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order, each with its own input arguments
    inputs: Vec<InputSpec>,
    /// Output file path (or `-` for stdout)
    output: String,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
    /// Emit `-progress pipe:2`
    progress: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with one file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![InputSpec {
                args: Vec::new(),
                source: path_arg(input.as_ref()),
            }],
            output: path_arg(output.as_ref()),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
            progress: true,
        }
    }

    /// Decode `input` to packed RGB24 frames on stdout.
    pub fn decode_to_raw_rgb(input: impl AsRef<Path>) -> Self {
        Self::new(input, PIPE)
            .output_args(["-map", "0:v:0", "-an", "-sn", "-vsync", "passthrough"])
            .output_args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .without_progress()
    }

    /// Encode packed RGB24 frames read from stdin into `output`.
    pub fn encode_from_raw_rgb(
        width: u32,
        height: u32,
        frame_rate: FrameRate,
        output: impl AsRef<Path>,
    ) -> Self {
        let mut cmd = Self::new(PIPE, output);
        cmd.inputs[0].args = vec![
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-framerate".to_string(),
            frame_rate.to_string(),
        ];
        cmd
    }

    /// Append another input with its own input arguments.
    pub fn extra_input<I, S>(mut self, args: I, input: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(InputSpec {
            args: args.into_iter().map(Into::into).collect(),
            source: path_arg(input.as_ref()),
        });
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Map a stream specifier into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Disable `-progress pipe:2`.
    pub fn without_progress(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        if self.progress {
            args.push("-progress".to_string());
            args.push("pipe:2".to_string());
            args.push("-nostats".to_string());
        }

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }

    /// Build a tokio command ready for stdio configuration and spawning.
    pub fn to_command(&self) -> MediaResult<Command> {
        check_ffmpeg()?;
        let args = self.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut command = Command::new("ffmpeg");
        command.args(&args).kill_on_drop(true);
        Ok(command)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_args() {
        let args = FfmpegCommand::decode_to_raw_rgb("input.mov").build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "input.mov");
        assert!(args.contains(&"rawvideo".to_string()));
        assert!(args.contains(&"rgb24".to_string()));
        assert!(!args.contains(&"-progress".to_string()));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_encode_args_keep_exact_rate() {
        let rate = FrameRate::new(30000, 1001);
        let cmd = FfmpegCommand::encode_from_raw_rgb(64, 114, rate, "out.mp4")
            .extra_input(Vec::<String>::new(), "source.mp4")
            .map("0:v:0")
            .map("1:a:0?")
            .output_args(["-c:v", "libx264"]);
        let args = cmd.build_args();

        let first_i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[first_i + 1], "-");
        assert!(args[..first_i].contains(&"30000/1001".to_string()));
        assert!(args[..first_i].contains(&"64x114".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(args.last().unwrap(), "out.mp4");
    }
}
