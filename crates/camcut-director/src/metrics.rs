//! Prometheus metrics for selection runs.
//!
//! The library records through the `metrics` facade. The CLI installs a
//! Prometheus recorder with [`init_metrics`] and writes a text snapshot
//! when asked to.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;

use crate::error::{DirectorError, DirectorResult};

/// Install the Prometheus recorder as the global recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> DirectorResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| DirectorError::config_error(format!("failed to install metrics recorder: {e}")))
}

/// Write the current metrics in Prometheus text format, for a textfile
/// collector to pick up.
pub async fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> DirectorResult<()> {
    tokio::fs::write(path, handle.render()).await?;
    Ok(())
}

/// Metric names as constants for consistency.
pub mod names {
    pub const WINDOWS_TOTAL: &str = "camcut_windows_total";
    pub const SOURCE_WINS_TOTAL: &str = "camcut_source_wins_total";
    pub const SOURCES_EXHAUSTED_TOTAL: &str = "camcut_sources_exhausted_total";
    pub const WINDOW_SCORE: &str = "camcut_window_score";
    pub const RUNS_TOTAL: &str = "camcut_runs_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "camcut_ffmpeg_duration_seconds";
}

/// Record one evaluated window and its winner.
pub fn record_window(source_index: usize, score: i64) {
    counter!(names::WINDOWS_TOTAL).increment(1);

    let labels = [("source", source_index.to_string())];
    counter!(names::SOURCE_WINS_TOTAL, &labels).increment(1);
    histogram!(names::WINDOW_SCORE).record(score as f64);
}

/// Record sources dropping out of the run.
pub fn record_sources_exhausted(count: usize) {
    if count > 0 {
        counter!(names::SOURCES_EXHAUSTED_TOTAL).increment(count as u64);
    }
}

/// Record the end of a run (`completed`, `drained`, or an error kind).
pub fn record_run(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
}

/// Record an FFmpeg stage duration.
pub fn record_ffmpeg_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}
