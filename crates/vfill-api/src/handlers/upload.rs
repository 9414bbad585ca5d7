//! Video upload and conversion.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use vfill_models::{
    is_allowed_container, JobStats, ProcessingOptions, VideoJob, ALLOWED_EXTENSIONS,
    DEFAULT_KEYFRAME_INTERVAL,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// `POST /upload` response body.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    /// URL of the vertical video under `/static/output`
    pub output_video: String,
    pub message: String,
    pub stats: JobStats,
    pub degraded: bool,
    pub warnings: Vec<String>,
}

/// Parsed multipart form.
#[derive(Debug)]
struct UploadForm {
    stored_path: PathBuf,
    bytes: u64,
    use_keyframes: bool,
    keyframe_interval: u32,
    sample_rate: u32,
}

impl UploadForm {
    fn options(&self) -> ProcessingOptions {
        ProcessingOptions::from_form(self.use_keyframes, self.keyframe_interval, self.sample_rate)
    }
}

/// Reduce a client file name to `[A-Za-z0-9._-]`, without leading dots.
pub fn sanitize_filename(name: &str) -> String {
    // Browsers on Windows may send the full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn parse_count(name: &str, value: &str) -> ApiResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{} must be a non-negative integer", name)))
}

/// Stream one file field to disk and return the bytes written.
async fn store_field(field: &mut Field<'_>, path: &Path) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload file: {}", e)))?;

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;

    Ok(written)
}

async fn read_form(uploads_dir: &Path, multipart: &mut Multipart) -> ApiResult<UploadForm> {
    let mut stored: Option<(PathBuf, u64)> = None;
    let fields = read_fields(uploads_dir, multipart, &mut stored).await;

    match (fields, stored) {
        (Ok(fields), Some((stored_path, bytes))) => Ok(UploadForm {
            stored_path,
            bytes,
            use_keyframes: fields.use_keyframes,
            keyframe_interval: fields.keyframe_interval,
            sample_rate: fields.sample_rate,
        }),
        (Ok(_), None) => Err(ApiError::bad_request("No file part")),
        (Err(e), stored) => {
            if let Some((path, _)) = stored {
                let _ = tokio::fs::remove_file(&path).await;
            }
            Err(e)
        }
    }
}

/// Non-file form fields.
struct FormFields {
    use_keyframes: bool,
    keyframe_interval: u32,
    sample_rate: u32,
}

/// Walk the multipart stream. The stored upload is reported through `stored`
/// even when a later field fails, so the caller can remove it.
async fn read_fields(
    uploads_dir: &Path,
    multipart: &mut Multipart,
    stored: &mut Option<(PathBuf, u64)>,
) -> ApiResult<FormFields> {
    let mut fields = FormFields {
        use_keyframes: false,
        keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
        sample_rate: 1,
    };

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if stored.is_some() {
                    return Err(ApiError::bad_request("Only one file may be uploaded"));
                }
                let original = field.file_name().unwrap_or_default().to_string();
                if original.trim().is_empty() {
                    return Err(ApiError::bad_request("No file selected"));
                }
                if !is_allowed_container(&original) {
                    return Err(ApiError::bad_request(format!(
                        "Unsupported file type; allowed: {}",
                        ALLOWED_EXTENSIONS.join(", ")
                    )));
                }

                let mut safe_name = sanitize_filename(&original);
                if !is_allowed_container(&safe_name) {
                    let ext = Path::new(&original)
                        .extension()
                        .map(|e| e.to_string_lossy().to_ascii_lowercase())
                        .unwrap_or_default();
                    safe_name = format!("upload.{}", ext);
                }
                let path = uploads_dir.join(format!("{}_{}", Uuid::new_v4(), safe_name));
                match store_field(&mut field, &path).await {
                    Ok(bytes) => *stored = Some((path, bytes)),
                    Err(e) => {
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(e);
                    }
                }
            }
            "use_keyframes" => fields.use_keyframes = parse_bool(&field.text().await?),
            "keyframe_interval" => {
                fields.keyframe_interval = parse_count("keyframe_interval", &field.text().await?)?
            }
            "sample_rate" => {
                fields.sample_rate = parse_count("sample_rate", &field.text().await?)?
            }
            _ => {}
        }
    }

    Ok(fields)
}

/// `POST /upload`: store the video, convert it, and report the result.
///
/// The job runs on its own task. If the client goes away the handler future is
/// dropped and the guard cancels the job.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let uploads_dir = state.config.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {}", e)))?;

    let form = match read_form(&uploads_dir, &mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            metrics::record_upload("rejected", 0);
            return Err(e);
        }
    };
    let options = form.options();
    if let Err(e) = options.validate() {
        let _ = tokio::fs::remove_file(&form.stored_path).await;
        metrics::record_upload("rejected", form.bytes);
        return Err(ApiError::bad_request(e.to_string()));
    }

    info!(
        path = %form.stored_path.display(),
        bytes = form.bytes,
        mode = options.mode.as_str(),
        interval = options.keyframe_interval,
        "Upload stored"
    );

    let mut job = VideoJob::new(&form.stored_path, state.config.output_dir(), options);
    let job_id = job.id.clone();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel_on_drop = scopeguard::guard(cancel_tx, |tx| {
        warn!(job_id = %job_id, "Client disconnected, cancelling job");
        let _ = tx.send(true);
    });

    let processor = state.processor.clone();
    let handle = tokio::spawn(async move { processor.process(&mut job, cancel_rx).await });
    let result = handle.await;
    let _ = scopeguard::ScopeGuard::into_inner(cancel_on_drop);

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            state.counters.record_failure();
            metrics::record_upload(if e.is_user_error() { "invalid" } else { "failed" }, form.bytes);
            if e.is_user_error() {
                let _ = tokio::fs::remove_file(&form.stored_path).await;
            }
            return Err(e.into());
        }
        Err(e) => {
            state.counters.record_failure();
            metrics::record_upload("failed", form.bytes);
            return Err(ApiError::internal(format!("Processing task failed: {}", e)));
        }
    };

    state.counters.record_success(&output.stats);
    metrics::record_upload(
        if output.stats.degraded { "degraded" } else { "success" },
        form.bytes,
    );

    let file_name = output
        .output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let message = if output.stats.degraded {
        "Video processed with the local fallback for some frames; AI outpainting was unavailable"
    } else if output.stats.ai_generated == 0 {
        "Video processed with the local fallback"
    } else {
        "Video processed successfully"
    };

    Ok(Json(UploadResponse {
        success: true,
        output_video: format!("/static/output/{}", file_name),
        message: message.to_string(),
        degraded: output.stats.degraded,
        warnings: output.stats.warnings.clone(),
        stats: output.stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my clip (1).mp4"), "my_clip_1.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\video.MOV"), "video.MOV");
        assert_eq!(sanitize_filename(".hidden.webm"), "hidden.webm");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" On "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_sample_rate_maps_to_keyframes() {
        let form = UploadForm {
            stored_path: PathBuf::from("x.mp4"),
            bytes: 0,
            use_keyframes: false,
            keyframe_interval: 24,
            sample_rate: 5,
        };
        assert_eq!(form.options(), ProcessingOptions::keyframes(5));
    }
}
