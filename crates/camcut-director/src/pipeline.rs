//! End-to-end run: open sources, select, assemble, mux, clean up.

use camcut_media::{ContentScorer, MediaSource};
use camcut_models::{OutputFormat, RunId, RunSummary};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{warn, Instrument};

use crate::backend::{
    FfmpegOutput, FfmpegSourceOpener, FinishRequest, OutputBackend, SourceOpener,
};
use crate::config::DirectorConfig;
use crate::engine::{EngineReport, EngineSettings, SelectionEngine};
use crate::error::{DirectorError, DirectorResult};
use crate::lifecycle::TempArtifacts;
use crate::logging::RunLogger;
use crate::metrics;
use crate::progress::ProgressSender;

/// What to produce.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source files or part directories, in index order
    pub sources: Vec<PathBuf>,
    /// Where the muxed output goes
    pub destination: PathBuf,
    /// Output duration to aim for, in seconds
    pub target_secs: f64,
    /// Optional logo image
    pub overlay: Option<PathBuf>,
    /// Keep temporary artifacts after the run
    pub retain_temp: bool,
}

impl RunRequest {
    pub fn validate(&self) -> DirectorResult<()> {
        if self.sources.is_empty() {
            return Err(DirectorError::invalid_request("at least one source is required"));
        }
        if !(self.target_secs > 0.0) {
            return Err(DirectorError::invalid_request(format!(
                "target duration must be positive, got {}",
                self.target_secs
            )));
        }
        if let Some(logo) = &self.overlay {
            if !logo.is_file() {
                return Err(DirectorError::invalid_request(format!(
                    "overlay image not found: {}",
                    logo.display()
                )));
            }
        }
        Ok(())
    }
}

/// Runs selection jobs with one scorer shared across runs.
///
/// Sources are opened through `O` and output is written through `B`; both
/// default to FFmpeg.
pub struct Director<O = FfmpegSourceOpener, B = FfmpegOutput> {
    config: DirectorConfig,
    scorer: Arc<dyn ContentScorer>,
    opener: O,
    output: B,
}

impl Director {
    pub fn new(config: DirectorConfig, scorer: Arc<dyn ContentScorer>) -> DirectorResult<Self> {
        let output = FfmpegOutput::from_config(&config);
        Self::with_backends(config, scorer, FfmpegSourceOpener, output)
    }
}

impl<O: SourceOpener, B: OutputBackend> Director<O, B> {
    pub fn with_backends(
        config: DirectorConfig,
        scorer: Arc<dyn ContentScorer>,
        opener: O,
        output: B,
    ) -> DirectorResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer,
            opener,
            output,
        })
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Execute one run.
    ///
    /// Temporary artifacts are released on every path out of here. An early
    /// stop because every source ran dry is a successful `Drained` run.
    pub async fn run(
        &self,
        request: RunRequest,
        progress: Option<ProgressSender>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> DirectorResult<RunSummary> {
        request.validate()?;

        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "select");
        let span = logger.create_span();
        let started_at = Utc::now();

        logger.log_start(&format!(
            "{} sources, target {}s, destination {}",
            request.sources.len(),
            request.target_secs,
            request.destination.display()
        ));

        let mut artifacts =
            TempArtifacts::create(&self.config.temp_dir, run_id.clone(), request.retain_temp)?;

        let result = self
            .execute(&request, &mut artifacts, progress, cancel)
            .instrument(span)
            .await;

        let released = artifacts.release();
        if !released.failed.is_empty() {
            logger.log_warning(&format!(
                "{} temporary artifacts could not be removed",
                released.failed.len()
            ));
        }

        match result {
            Ok((report, destination)) => {
                metrics::record_run(report.outcome.as_str());
                logger.log_completion(&format!(
                    "{} after {} windows ({}s)",
                    report.outcome,
                    report.decisions.len(),
                    report.elapsed_secs
                ));
                Ok(RunSummary {
                    run_id,
                    outcome: report.outcome,
                    window_secs: self.config.window_secs,
                    target_secs: request.target_secs,
                    elapsed_secs: report.elapsed_secs,
                    decisions: report.decisions,
                    destination,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                metrics::record_run(e.kind());
                logger.log_error(&e.to_string());
                if let Some(diagnostics) = e.diagnostics() {
                    logger.log_error(diagnostics);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        artifacts: &mut TempArtifacts,
        progress: Option<ProgressSender>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> DirectorResult<(EngineReport, Option<PathBuf>)> {
        let mut sources = self.open_sources(&request.sources, self.config.output).await?;

        let selected = self
            .select(request, artifacts, &mut sources, progress, cancel.clone())
            .await;
        close_sources(&mut sources).await;
        let (report, sink) = selected?;

        if report.decisions.is_empty() {
            self.output.abort(sink);
            warn!(run_id = %artifacts.run_id(), "No source produced a full window, nothing to write");
            return Ok((report, None));
        }

        let destination = self
            .output
            .finish(
                sink,
                artifacts,
                FinishRequest {
                    destination: &request.destination,
                    overlay: request.overlay.as_deref(),
                    elapsed_secs: report.elapsed_secs,
                    cancel,
                },
            )
            .await?;

        Ok((report, Some(destination)))
    }

    /// Run the engine into a fresh sink.
    async fn select(
        &self,
        request: &RunRequest,
        artifacts: &mut TempArtifacts,
        sources: &mut [O::Source],
        progress: Option<ProgressSender>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> DirectorResult<(EngineReport, B::Sink)> {
        let mut sink = self.output.create_sink(artifacts, sources.len())?;

        let settings = EngineSettings {
            window_secs: self.config.window_secs,
            target_secs: request.target_secs,
            classes: self.config.classes,
        };
        let mut engine =
            SelectionEngine::new(artifacts.run_id().clone(), self.scorer.as_ref(), settings);
        if let Some(progress) = progress {
            engine = engine.with_progress(progress);
        }
        if let Some(cancel) = cancel {
            engine = engine.with_cancel(cancel);
        }

        match engine.run(sources, &mut sink).await {
            Ok(report) => Ok((report, sink)),
            Err(e) => {
                self.output.abort(sink);
                Err(e)
            }
        }
    }

    /// Open every source in order. On failure, sources already opened are closed.
    async fn open_sources(
        &self,
        paths: &[PathBuf],
        format: OutputFormat,
    ) -> DirectorResult<Vec<O::Source>> {
        let mut sources = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            match self.opener.open(index, path, format).await {
                Ok(source) => sources.push(source),
                Err(e) => {
                    close_sources(&mut sources).await;
                    return Err(DirectorError::source_open(path, e));
                }
            }
        }
        Ok(sources)
    }
}

/// Close all sources, logging rather than failing on close errors.
async fn close_sources<S: MediaSource>(sources: &mut [S]) {
    for source in sources.iter_mut() {
        if let Err(e) = source.close().await {
            warn!(source_index = source.index(), error = %e, "Failed to close source");
        }
    }
}
