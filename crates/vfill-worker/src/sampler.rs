//! Frame sampling.

use validator::Validate;
use vfill_media::SourceVideo;
use vfill_models::{ProcessingMode, ProcessingOptions};

use crate::error::{WorkerError, WorkerResult};

/// Ordered, de-duplicated frame indices to submit for outpainting.
///
/// Full mode selects every index. Keyframe mode selects multiples of the
/// interval plus the final frame.
pub fn sample_indices(frame_count: u64, options: &ProcessingOptions) -> WorkerResult<Vec<u64>> {
    if frame_count == 0 {
        return Err(WorkerError::invalid_video("video has no frames"));
    }
    options
        .validate()
        .map_err(|e| WorkerError::InvalidOptions(e.to_string()))?;

    let indices = match options.mode {
        ProcessingMode::Full => (0..frame_count).collect(),
        ProcessingMode::Keyframe => {
            let step = options.keyframe_interval as usize;
            let mut indices: Vec<u64> = (0..frame_count).step_by(step).collect();
            let last = frame_count - 1;
            if indices.last() != Some(&last) {
                indices.push(last);
            }
            indices
        }
    };

    Ok(indices)
}

/// Sample a decoded video.
pub fn sample_video(video: &SourceVideo, options: &ProcessingOptions) -> WorkerResult<Vec<u64>> {
    sample_indices(video.frame_count(), options)
}
