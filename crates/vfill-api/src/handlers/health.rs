//! Health check handlers.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    /// "ai" when a backend is configured, "fallback_only" otherwise
    pub outpainting: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
    pub output_dir: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn from_result<T, E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(e) => Self::error(e.to_string()),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

async fn check_writable(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let marker = dir.join(".ready");
    tokio::fs::write(&marker, b"ok").await?;
    tokio::fs::remove_file(&marker).await
}

/// Readiness check endpoint (readiness probe).
/// Checks that FFmpeg tooling is installed and the output directory is writable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let checks = ReadinessChecks {
        ffmpeg: CheckStatus::from_result(vfill_media::check_ffmpeg()),
        ffprobe: CheckStatus::from_result(vfill_media::check_ffprobe()),
        output_dir: CheckStatus::from_result(check_writable(&state.config.output_dir()).await),
    };

    let all_ok = checks.ffmpeg.is_ok() && checks.ffprobe.is_ok() && checks.output_dir.is_ok();
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "not_ready" }.to_string(),
        outpainting: if state.processor.has_backend() {
            "ai"
        } else {
            "fallback_only"
        }
        .to_string(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
