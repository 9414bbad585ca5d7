//! Service statistics.

use std::path::Path;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, CountersSnapshot};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Finished vertical videos present in the output directory
    pub videos_processed: u64,
    #[serde(flatten)]
    pub counters: CountersSnapshot,
}

/// Count finished outputs, skipping in-progress partial files.
async fn count_outputs(dir: &Path) -> std::io::Result<u64> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".mp4") && !name.ends_with(".part.mp4") && entry.file_type().await?.is_file()
        {
            count += 1;
        }
    }
    Ok(count)
}

/// `GET /api/stats`
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let videos_processed = count_outputs(&state.config.output_dir())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read output directory: {}", e)))?;

    Ok(Json(StatsResponse {
        videos_processed,
        counters: state.counters.snapshot(),
    }))
}
