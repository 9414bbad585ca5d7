//! Extensions for frames between samples.
//!
//! Sampled frames keep their own extension. A frame between samples `p` and
//! `f` gets `blend(ext(p), ext(f), (i - p) / (f - p))`. Frames before the
//! first or after the last sample repeat the nearest one. Bands are produced
//! on demand so only one interpolated frame is held at a time.

use std::sync::Arc;

use vfill_media::blend;

use crate::error::{WorkerError, WorkerResult};
use crate::extension::ExtensionResult;

#[derive(Debug)]
pub struct Interpolator {
    frame_count: u64,
    /// Sorted by index, unique
    samples: Vec<ExtensionResult>,
}

impl Interpolator {
    pub fn new(frame_count: u64, mut samples: Vec<ExtensionResult>) -> WorkerResult<Self> {
        samples.sort_by_key(|s| s.index);
        samples.dedup_by_key(|s| s.index);

        let first = samples
            .first()
            .ok_or_else(|| WorkerError::interpolation(0, "no sampled extensions"))?;
        let expected = first.dimensions();
        if let Some(bad) = samples.iter().find(|s| s.dimensions() != expected) {
            return Err(WorkerError::interpolation(
                bad.index,
                format!(
                    "band size {:?} differs from {:?}",
                    bad.dimensions(),
                    expected
                ),
            ));
        }
        if let Some(out_of_range) = samples.iter().find(|s| s.index >= frame_count) {
            return Err(WorkerError::interpolation(
                out_of_range.index,
                format!("sample outside a {}-frame video", frame_count),
            ));
        }

        Ok(Self {
            frame_count,
            samples,
        })
    }

    /// Blend weight of the following sample for frame `index`.
    pub fn weight(index: u64, prev: u64, next: u64) -> f64 {
        if next <= prev {
            return 0.0;
        }
        (index - prev) as f64 / (next - prev) as f64
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn samples(&self) -> &[ExtensionResult] {
        &self.samples
    }

    /// Extension for frame `index`.
    pub fn extension_for(&self, index: u64) -> WorkerResult<ExtensionResult> {
        if index >= self.frame_count {
            return Err(WorkerError::interpolation(
                index,
                format!("frame outside a {}-frame video", self.frame_count),
            ));
        }

        // Position of the first sample with sample.index >= index
        let pos = self.samples.partition_point(|s| s.index < index);

        if let Some(sample) = self.samples.get(pos).filter(|s| s.index == index) {
            return Ok(sample.clone());
        }

        let (prev, next) = match (pos.checked_sub(1), self.samples.get(pos)) {
            (Some(p), Some(next)) => (&self.samples[p], next),
            (None, Some(next)) => {
                return Ok(ExtensionResult::interpolated(
                    index,
                    next.top.clone(),
                    next.bottom.clone(),
                ))
            }
            (Some(p), None) => {
                let prev = &self.samples[p];
                return Ok(ExtensionResult::interpolated(
                    index,
                    prev.top.clone(),
                    prev.bottom.clone(),
                ));
            }
            (None, None) => return Err(WorkerError::interpolation(index, "no samples")),
        };

        let weight = Self::weight(index, prev.index, next.index);
        let top = blend(&prev.top, &next.top, weight)
            .map_err(|e| WorkerError::interpolation(index, e.to_string()))?;
        let bottom = blend(&prev.bottom, &next.bottom, weight)
            .map_err(|e| WorkerError::interpolation(index, e.to_string()))?;

        Ok(ExtensionResult::interpolated(
            index,
            Arc::new(top),
            Arc::new(bottom),
        ))
    }

    /// Extensions for every frame, in order.
    pub fn results(&self) -> WorkerResult<Vec<ExtensionResult>> {
        (0..self.frame_count)
            .map(|i| self.extension_for(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use vfill_models::ExtensionStatus;

    fn solid(index: u64, value: u8) -> ExtensionResult {
        ExtensionResult::ai(
            index,
            RgbImage::from_pixel(4, 2, Rgb([value; 3])),
            RgbImage::from_pixel(4, 3, Rgb([value; 3])),
            1,
        )
    }

    #[test]
    fn test_weight() {
        assert!((Interpolator::weight(25, 20, 29) - 5.0 / 9.0).abs() < 1e-12);
        assert_eq!(Interpolator::weight(20, 20, 29), 0.0);
        assert_eq!(Interpolator::weight(29, 20, 29), 1.0);
    }

    #[test]
    fn test_sampled_frame_keeps_its_extension() {
        let interp = Interpolator::new(30, vec![solid(0, 0), solid(10, 100)]).unwrap();
        let ext = interp.extension_for(10).unwrap();
        assert_eq!(ext.status, ExtensionStatus::AiGenerated);
        assert_eq!(ext.top.get_pixel(0, 0), &Rgb([100; 3]));
    }

    #[test]
    fn test_blends_between_samples() {
        let interp = Interpolator::new(30, vec![solid(20, 0), solid(29, 90)]).unwrap();
        let ext = interp.extension_for(25).unwrap();
        assert_eq!(ext.status, ExtensionStatus::Interpolated);
        // 90 * 5/9 = 50
        assert_eq!(ext.top.get_pixel(3, 1), &Rgb([50; 3]));
        assert_eq!(ext.bottom.get_pixel(0, 2), &Rgb([50; 3]));
    }

    #[test]
    fn test_holds_nearest_sample_at_ends() {
        let interp = Interpolator::new(10, vec![solid(3, 30), solid(6, 60)]).unwrap();
        assert_eq!(interp.extension_for(0).unwrap().top.get_pixel(0, 0), &Rgb([30; 3]));
        assert_eq!(interp.extension_for(9).unwrap().top.get_pixel(0, 0), &Rgb([60; 3]));
    }

    #[test]
    fn test_results_cover_every_frame() {
        let interp = Interpolator::new(7, vec![solid(6, 60), solid(0, 0), solid(3, 30)]).unwrap();
        let results = interp.results().unwrap();
        assert_eq!(results.len(), 7);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.index, i as u64);
        }
        assert_eq!(results[1].top.get_pixel(0, 0), &Rgb([10; 3]));
    }

    #[test]
    fn test_mismatched_bands_rejected() {
        let odd = ExtensionResult::ai(
            5,
            RgbImage::new(4, 5),
            RgbImage::new(4, 3),
            1,
        );
        let err = Interpolator::new(10, vec![solid(0, 0), odd]).unwrap_err();
        assert!(matches!(err, WorkerError::Interpolation { frame: 5, .. }));
    }

    #[test]
    fn test_empty_samples_rejected() {
        assert!(Interpolator::new(10, Vec::new()).is_err());
    }
}
