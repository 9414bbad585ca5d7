//! Output canvas geometry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Aspect ratio specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Portrait 9:16 used for Shorts/Reels/TikTok
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Source has zero width or height")]
    ZeroDimension,
    #[error("Source {width}x{height} is already at least as tall as the {target} canvas")]
    AlreadyVertical {
        width: u32,
        height: u32,
        target: AspectRatio,
    },
}

/// Which side of the source frame an extension band sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BandPosition {
    Top,
    Bottom,
}

impl BandPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BandPosition::Top => "top",
            BandPosition::Bottom => "bottom",
        }
    }
}

/// Placement of the source frame and its two extensions on the output canvas.
///
/// The canvas keeps the source width, rounded up to even for yuv420p; the
/// source frame is placed unscaled at the geometric center with the top band
/// above and the bottom band below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CanvasLayout {
    /// Canvas width (source width rounded up to even)
    pub width: u32,
    /// Canvas height (always even)
    pub height: u32,
    /// Source frame width
    pub source_width: u32,
    /// Source frame height
    pub source_height: u32,
    /// Height of the band above the source frame
    pub top: u32,
    /// Height of the band below the source frame
    pub bottom: u32,
}

impl CanvasLayout {
    /// Layout for a 9:16 canvas.
    pub fn vertical(source_width: u32, source_height: u32) -> Result<Self, LayoutError> {
        Self::for_aspect(source_width, source_height, AspectRatio::PORTRAIT)
    }

    /// Layout for an arbitrary target aspect ratio taller than the source.
    pub fn for_aspect(
        source_width: u32,
        source_height: u32,
        target: AspectRatio,
    ) -> Result<Self, LayoutError> {
        if source_width == 0 || source_height == 0 {
            return Err(LayoutError::ZeroDimension);
        }

        // yuv420p needs even dimensions
        let width = source_width + source_width % 2;
        let mut height =
            (source_width as u64 * target.height as u64 / target.width as u64) as u32;
        if height % 2 == 1 {
            height += 1;
        }

        if height <= source_height {
            return Err(LayoutError::AlreadyVertical {
                width: source_width,
                height: source_height,
                target,
            });
        }

        let total = height - source_height;
        let top = total / 2;

        Ok(Self {
            width,
            height,
            source_width,
            source_height,
            top,
            bottom: total - top,
        })
    }

    /// Horizontal offset of the source frame on the canvas.
    pub fn frame_x(&self) -> u32 {
        (self.width - self.source_width) / 2
    }

    /// Vertical offset of the source frame on the canvas.
    pub fn frame_y(&self) -> u32 {
        self.top
    }

    /// First canvas row of the bottom band.
    pub fn bottom_y(&self) -> u32 {
        self.top + self.source_height
    }
}
