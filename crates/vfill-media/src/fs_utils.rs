//! Output file handling.
//!
//! The encoder writes to a sibling partial file which is moved into place only
//! after FFmpeg exits cleanly, so a failed job never leaves a truncated
//! `<stem>_vertical.mp4` behind.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Partial path for `output`: `clip_vertical.mp4` becomes `clip_vertical.part.mp4`.
///
/// The container extension is kept so FFmpeg still infers the muxer.
pub fn partial_path(output: impl AsRef<Path>) -> PathBuf {
    let output = output.as_ref();
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{}.part.{}", stem, ext.to_string_lossy()),
        None => format!("{}.part", stem),
    };
    output.with_file_name(name)
}

/// Remove a partial output, ignoring a file that was never created.
pub async fn discard_partial(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-and-delete on EXDEV.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Stage next to dst so the final rename stays on one filesystem
    let staged = partial_path(dst);

    if let Err(e) = fs::copy(src, &staged).await {
        discard_partial(&staged).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staged, dst).await {
        discard_partial(&staged).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path_keeps_container_extension() {
        assert_eq!(
            partial_path("/out/clip_vertical.mp4"),
            PathBuf::from("/out/clip_vertical.part.mp4")
        );
        assert_eq!(partial_path("out"), PathBuf::from("out.part"));
    }

    #[tokio::test]
    async fn test_move_file_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.part.mp4");
        let dst = dir.path().join("output").join("a.mp4");

        fs::write(&src, b"frames").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_move_file_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("old.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_discard_partial_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never_written.part.mp4");
        discard_partial(&path).await;

        fs::write(&path, b"x").await.unwrap();
        discard_partial(&path).await;
        assert!(!path.exists());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
