//! Pixel operations on extension bands.
//!
//! Everything here is synchronous and CPU-bound; async callers run it on
//! `spawn_blocking`. Per-pixel loops are parallelised with rayon.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rayon::prelude::*;

use vfill_models::{BandPosition, CanvasLayout};

use crate::error::{MediaError, MediaResult};

/// Gaussian sigma applied to the mirrored edge.
pub const FALLBACK_BLUR_SIGMA: f32 = 3.0;

/// Mean colour of an image, rounded per channel. Black for an empty image.
pub fn average_color(image: &RgbImage) -> Rgb<u8> {
    let pixels = image.width() as u64 * image.height() as u64;
    if pixels == 0 {
        return Rgb([0, 0, 0]);
    }

    let sums = image
        .as_raw()
        .par_chunks(3)
        .fold(
            || [0u64; 3],
            |mut acc, px| {
                acc[0] += px[0] as u64;
                acc[1] += px[1] as u64;
                acc[2] += px[2] as u64;
                acc
            },
        )
        .reduce(|| [0u64; 3], |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]]);

    let mean = |sum: u64| ((sum as f64 / pixels as f64).round()).clamp(0.0, 255.0) as u8;
    Rgb([mean(sums[0]), mean(sums[1]), mean(sums[2])])
}

/// Deterministic local extension for one band.
///
/// Takes the `min(2 * height, frame_height / 3)` rows on the `position` edge
/// of the frame, mirrors them vertically, blurs them and fades them out away
/// from the seam over a base filled with the edge's average colour. The row
/// adjacent to the seam is the reflection of the frame's own edge row.
pub fn mirror_extension(frame: &RgbImage, position: BandPosition, height: u32) -> RgbImage {
    let width = frame.width();
    if height == 0 || width == 0 || frame.height() == 0 {
        return RgbImage::new(width, height);
    }

    let edge_height = (height.saturating_mul(2))
        .min(frame.height() / 3)
        .max(1)
        .min(frame.height());
    let edge_y = match position {
        BandPosition::Top => 0,
        BandPosition::Bottom => frame.height() - edge_height,
    };
    let edge = imageops::crop_imm(frame, 0, edge_y, width, edge_height).to_image();
    let base = average_color(&edge);

    let mut reflection = imageops::flip_vertical(&edge);
    reflection = imageops::blur(&reflection, FALLBACK_BLUR_SIGMA);

    let row_bytes = width as usize * 3;
    let mut band = RgbImage::from_pixel(width, height, base);

    band.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            // Rows counted from the seam, 0 at the source frame
            let distance = match position {
                BandPosition::Top => height - 1 - y,
                BandPosition::Bottom => y,
            };
            if distance >= edge_height {
                return;
            }

            // The flipped edge starts with the row nearest the seam for the
            // bottom band and ends with it for the top band
            let reflection_y = match position {
                BandPosition::Top => edge_height - 1 - distance,
                BandPosition::Bottom => distance,
            };
            let alpha = 1.0 - distance as f64 / edge_height as f64;
            let start = reflection_y as usize * row_bytes;
            let src = &reflection.as_raw()[start..start + row_bytes];

            for (i, out) in row.iter_mut().enumerate() {
                let fg = src[i] as f64;
                let bg = base.0[i % 3] as f64;
                *out = (fg * alpha + bg * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;
            }
        });

    band
}

/// Per-channel linear blend `round(a * (1 - weight) + b * weight)`.
///
/// A weight of 0 returns `a` exactly and a weight of 1 returns `b` exactly.
pub fn blend(a: &RgbImage, b: &RgbImage, weight: f64) -> MediaResult<RgbImage> {
    if a.dimensions() != b.dimensions() {
        return Err(MediaError::geometry(format!(
            "cannot blend {}x{} with {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    if !(0.0..=1.0).contains(&weight) {
        return Err(MediaError::geometry(format!(
            "blend weight {} outside [0, 1]",
            weight
        )));
    }

    let mut out = vec![0u8; a.as_raw().len()];
    out.par_iter_mut()
        .zip(a.as_raw().par_iter())
        .zip(b.as_raw().par_iter())
        .for_each(|((o, &x), &y)| {
            *o = (x as f64 * (1.0 - weight) + y as f64 * weight).round() as u8;
        });

    RgbImage::from_raw(a.width(), a.height(), out)
        .ok_or_else(|| MediaError::internal("blend buffer size mismatch"))
}

/// Place `frame` on a canvas-wide strip at `layout.frame_x()`.
///
/// Padding columns repeat the frame's outermost column on each side. Returns
/// the frame unchanged when it already spans the canvas width.
pub fn widen_to_canvas<'a>(
    frame: &'a RgbImage,
    layout: &CanvasLayout,
) -> MediaResult<Cow<'a, RgbImage>> {
    if frame.width() == layout.width {
        return Ok(Cow::Borrowed(frame));
    }
    if frame.width() == 0 || frame.width() > layout.width {
        return Err(MediaError::geometry(format!(
            "frame width {} does not fit canvas width {}",
            frame.width(),
            layout.width
        )));
    }

    let raw = widen_rows(frame.as_raw(), frame.width(), layout.width, layout.frame_x());
    RgbImage::from_raw(layout.width, frame.height(), raw)
        .map(Cow::Owned)
        .ok_or_else(|| MediaError::internal("widened frame buffer size mismatch"))
}

fn widen_rows(src: &[u8], width: u32, canvas_width: u32, left: u32) -> Vec<u8> {
    let frame_row = width as usize * 3;
    let canvas_row = canvas_width as usize * 3;
    let left = left as usize;
    let right = canvas_width as usize - width as usize - left;

    let mut out = Vec::with_capacity(canvas_row * (src.len() / frame_row.max(1)));
    for row in src.chunks(frame_row) {
        let first = &row[..3];
        let last = &row[frame_row - 3..];
        for _ in 0..left {
            out.extend_from_slice(first);
        }
        out.extend_from_slice(row);
        for _ in 0..right {
            out.extend_from_slice(last);
        }
    }
    out
}

/// Stack top band, source frame and bottom band into one canvas.
///
/// The source frame is placed unscaled and horizontally centred; any padding
/// columns beside it repeat its edge columns.
pub fn compose_canvas(
    frame: &RgbImage,
    top: &RgbImage,
    bottom: &RgbImage,
    layout: &CanvasLayout,
) -> MediaResult<RgbImage> {
    let expect = |name: &str, image: &RgbImage, w: u32, h: u32| -> MediaResult<()> {
        if image.dimensions() != (w, h) {
            return Err(MediaError::geometry(format!(
                "{} is {}x{}, expected {}x{}",
                name,
                image.width(),
                image.height(),
                w,
                h
            )));
        }
        Ok(())
    };
    expect("frame", frame, layout.source_width, layout.source_height)?;
    expect("top band", top, layout.width, layout.top)?;
    expect("bottom band", bottom, layout.width, layout.bottom)?;

    let canvas_row = layout.width as usize * 3;
    let mut raw = Vec::with_capacity(canvas_row * layout.height as usize);
    raw.extend_from_slice(top.as_raw());

    if layout.source_width == layout.width {
        raw.extend_from_slice(frame.as_raw());
    } else {
        raw.extend(widen_rows(
            frame.as_raw(),
            layout.source_width,
            layout.width,
            layout.frame_x(),
        ));
    }

    raw.extend_from_slice(bottom.as_raw());

    RgbImage::from_raw(layout.width, layout.height, raw)
        .ok_or_else(|| MediaError::internal("canvas buffer size mismatch"))
}

/// Cut the top and bottom bands from a generated full-canvas image.
///
/// The image is first resized (Lanczos3) to the canvas size when the service
/// returned a different resolution.
pub fn cut_bands(generated: &RgbImage, layout: &CanvasLayout) -> MediaResult<(RgbImage, RgbImage)> {
    if generated.width() == 0 || generated.height() == 0 {
        return Err(MediaError::geometry("generated image is empty"));
    }

    let resized;
    let canvas = if generated.dimensions() == (layout.width, layout.height) {
        generated
    } else {
        resized = imageops::resize(generated, layout.width, layout.height, FilterType::Lanczos3);
        &resized
    };

    let top = imageops::crop_imm(canvas, 0, 0, layout.width, layout.top).to_image();
    let bottom =
        imageops::crop_imm(canvas, 0, layout.bottom_y(), layout.width, layout.bottom).to_image();
    Ok((top, bottom))
}
