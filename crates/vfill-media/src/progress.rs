//! Encoder progress from `-progress pipe:2`.

use serde::Serialize;

/// Classification of one encoder stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// A `key=value` progress field, absorbed into the running state
    Field,
    /// A `progress=` terminator closing one report
    Report(EncodeProgress),
    /// Anything else (warnings, errors, banners)
    Other,
}

/// Running state of an encode, one report per `progress=` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EncodeProgress {
    /// Frames the encoder has emitted so far
    pub frame: u64,
    pub fps: f64,
    /// Encoded media time in microseconds
    pub out_time_us: i64,
    /// Realtime multiple, `0.0` until known
    pub speed: f64,
    pub done: bool,
}

impl EncodeProgress {
    /// Fold one stderr line into the state.
    pub fn feed(&mut self, line: &str) -> ProgressLine {
        let Some((key, value)) = line.trim().split_once('=') else {
            return ProgressLine::Other;
        };
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return ProgressLine::Other;
        }

        let value = value.trim();
        match key {
            // both keys carry microseconds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse() {
                    self.out_time_us = us;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                self.done = value == "end";
                return ProgressLine::Report(self.clone());
            }
            _ => {}
        }
        ProgressLine::Field
    }
}
