//! Command-line runner: convert one horizontal video to a vertical one.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vfill_models::{ProcessingOptions, VideoJob, DEFAULT_KEYFRAME_INTERVAL};
use vfill_outpaint::OutpaintConfig;
use vfill_worker::{VideoProcessor, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "vfill-worker", version, about = "Outpaint a 16:9 video into 9:16")]
struct Cli {
    /// Source video (mp4, mov, avi or webm)
    input: PathBuf,

    /// Directory for the `<stem>_vertical.mp4` output
    #[arg(short, long, env = "WORKER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Outpaint only keyframes and interpolate the frames between them
    #[arg(long)]
    keyframes: bool,

    /// Keyframe spacing in frames
    #[arg(long, default_value_t = DEFAULT_KEYFRAME_INTERVAL)]
    interval: u32,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = match "vfill=info".parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = WorkerConfig::from_env();
    if let Some(dir) = cli.output_dir {
        config = config.with_output_dir(dir);
    }
    let outpaint = OutpaintConfig::from_env();
    info!("Worker config: {:?}", config);
    info!("Outpaint config: {:?}", outpaint);

    let options = if cli.keyframes {
        ProcessingOptions::keyframes(cli.interval)
    } else {
        ProcessingOptions::full()
    };

    let output_dir = config.output_dir.clone();
    let processor = match VideoProcessor::new(config, outpaint) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create processor: {}", e);
            std::process::exit(1);
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling job");
            let _ = cancel_tx.send(true);
        }
    });

    let mut job = VideoJob::new(&cli.input, output_dir, options);
    match processor.process(&mut job, cancel_rx).await {
        Ok(output) => {
            info!("Wrote {}", output.output_path.display());
            match serde_json::to_string_pretty(&output.stats) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to serialize stats: {}", e),
            }
        }
        Err(e) => {
            error!("Job {} failed: {}", job.id, e);
            std::process::exit(1);
        }
    }
}
