use std::path::Path;

use vfill_outpaint::OutpaintConfig;
use vfill_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={} output_dir={}",
        config.work_dir,
        config.output_dir.display()
    );
    ensure_writable_dir(&config.work_dir).await?;
    ensure_writable_dir(&config.output_dir).await?;
    ensure_ffmpeg()?;

    if !OutpaintConfig::from_env().has_credentials() {
        println!("worker-selfcheck: REPLICATE_API_TOKEN not set, jobs will use the local fallback");
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_writable_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let marker = path.join(".vfill-selfcheck");
    tokio::fs::write(&marker, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("{} is not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    let ffmpeg = vfill_media::check_ffmpeg()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = vfill_media::check_ffprobe()
        .map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;

    println!(
        "worker-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}
