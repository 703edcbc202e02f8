//! camcut command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use camcut_director::{metrics, progress_channel, Director, DirectorConfig, RunRequest};
use camcut_media::ObjectDetector;
use camcut_models::RunOutcome;

/// Assemble one continuous video from several camera feeds by picking the
/// most active feed for every window.
#[derive(Debug, Parser)]
#[command(name = "camcut", version, about)]
struct Cli {
    /// Source file or directory of parts; repeat once per camera
    #[arg(short, long = "source", required = true)]
    sources: Vec<PathBuf>,

    /// Destination file
    #[arg(short, long)]
    dest: PathBuf,

    /// Target output duration in seconds
    #[arg(short = 't', long, env = "CAMCUT_DURATION", default_value_t = 5400.0)]
    duration: f64,

    /// Logo image overlaid in the top-left corner
    #[arg(long, env = "CAMCUT_LOGO")]
    logo: Option<PathBuf>,

    /// Keep temporary artifacts
    #[arg(long)]
    keep: bool,

    /// Window length in seconds
    #[arg(long)]
    window: Option<f64>,

    /// Directory for temporary artifacts
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// YOLOv8 ONNX model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Log JSON lines instead of human-readable output
    #[arg(long)]
    json: bool,

    /// Print one JSON progress record per window on stdout
    #[arg(long)]
    progress: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, env = "CAMCUT_METRICS_FILE")]
    metrics_file: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let use_json = json
        || std::env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("camcut=info,ort=warn,onnxruntime=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
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
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json);

    info!("Starting camcut");

    match run(cli).await {
        Ok(outcome) => {
            info!(outcome = %outcome, "camcut finished");
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    let mut config = DirectorConfig::from_env();
    if let Some(window) = cli.window {
        config.window_secs = window;
    }
    if let Some(temp_dir) = cli.temp_dir {
        config.temp_dir = temp_dir;
    }
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    info!("Director config: {:?}", config);

    let metrics_handle = match &cli.metrics_file {
        Some(_) => Some(metrics::init_metrics()?),
        None => None,
    };

    let detector = ObjectDetector::new(config.detector_config())
        .context("failed to load the object detection model")?;
    let director = Director::new(config.clone(), Arc::new(detector))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, stopping at the next window");
            let _ = cancel_tx.send(true);
        }
    });

    let (progress_tx, mut progress_rx) = progress_channel(config.progress_buffer);
    let print_progress = cli.progress;
    let printer = tokio::spawn(async move {
        while let Some(record) = progress_rx.recv().await {
            if print_progress {
                if let Ok(line) = serde_json::to_string(&record) {
                    println!("{}", line);
                }
            }
        }
    });

    let request = RunRequest {
        sources: cli.sources,
        destination: cli.dest,
        target_secs: cli.duration,
        overlay: cli.logo,
        retain_temp: cli.keep,
    };

    let result = director
        .run(request, Some(progress_tx), Some(cancel_rx))
        .await;
    printer.await.ok();

    if let (Some(handle), Some(path)) = (&metrics_handle, &cli.metrics_file) {
        if let Err(e) = metrics::write_snapshot(handle, path).await {
            error!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }

    let summary = result?;
    if let Some(path) = cli.report {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    if summary.outcome.is_early_stop() {
        info!(
            elapsed_secs = summary.elapsed_secs,
            "All sources ran out before the target duration"
        );
    }
    Ok(summary.outcome)
}
