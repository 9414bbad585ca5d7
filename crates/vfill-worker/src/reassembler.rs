//! Compose every source frame with its extension and stream it to the encoder.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use vfill_media::{compose_canvas, FrameSink, SourceVideo};
use vfill_models::CanvasLayout;

use crate::cancel::is_cancelled;
use crate::error::{WorkerError, WorkerResult};
use crate::interpolator::Interpolator;

pub struct Reassembler {
    layout: CanvasLayout,
}

impl Reassembler {
    pub fn new(layout: CanvasLayout) -> Self {
        Self { layout }
    }

    /// Write all frames of `video`, in order, to `sink` and finish it.
    ///
    /// The sink is aborted on any failure so no partial output survives.
    /// Returns the number of frames written.
    pub async fn reassemble(
        &self,
        video: &SourceVideo,
        extensions: Arc<Interpolator>,
        sink: &mut dyn FrameSink,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<u64> {
        match self.write_all(video, extensions, sink, cancel).await {
            Ok(written) => Ok(written),
            Err(e) => {
                sink.abort().await;
                Err(e)
            }
        }
    }

    async fn write_all(
        &self,
        video: &SourceVideo,
        extensions: Arc<Interpolator>,
        sink: &mut dyn FrameSink,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<u64> {
        let total = video.frame_count();
        info!(frames = total, width = self.layout.width, height = self.layout.height, "Reassembling");

        for frame in &video.frames {
            if is_cancelled(cancel) {
                return Err(WorkerError::Cancelled);
            }

            let index = frame.index;
            let image = frame.image.clone();
            let layout = self.layout;
            let extensions = extensions.clone();
            let canvas = tokio::task::spawn_blocking(move || {
                let ext = extensions.extension_for(index)?;
                compose_canvas(&image, &ext.top, &ext.bottom, &layout)
                    .map_err(|e| WorkerError::compose(index, e.to_string()))
            })
            .await
            .map_err(|e| WorkerError::internal(format!("compose task failed: {}", e)))??;

            sink.write_frame(&canvas).await?;

            if index % 100 == 0 {
                debug!(frame = index, total, "Frame written");
            }
        }

        let written = sink.finish().await?;
        if written != total {
            return Err(WorkerError::Encode(format!(
                "encoded {} frames, expected {}",
                written, total
            )));
        }

        Ok(written)
    }
}
