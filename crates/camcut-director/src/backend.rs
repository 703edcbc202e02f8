//! Seams between the run pipeline and the media it drives.
//!
//! [`SourceOpener`] turns source paths into readers and [`OutputBackend`]
//! owns everything written: the per-window sink, its finalization and the
//! final mux. The FFmpeg implementations are the defaults of
//! [`Director`](crate::Director).

use async_trait::async_trait;
use camcut_media::{
    mux_final, FfmpegRunner, MediaResult, MediaSource, MuxRequest, OverlayConfig, SourceReader,
};
use camcut_models::{EncodingConfig, OutputFormat};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::watch;

use crate::assembler::OutputAssembler;
use crate::config::DirectorConfig;
use crate::engine::WindowSink;
use crate::error::{DirectorError, DirectorResult};
use crate::lifecycle::{ArtifactRole, TempArtifacts};
use crate::metrics;

/// Opens one source for a run.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    type Source: MediaSource;

    async fn open(&self, index: usize, path: &Path, format: OutputFormat) -> MediaResult<Self::Source>;
}

/// What the finished output needs besides the sink.
#[derive(Debug, Clone)]
pub struct FinishRequest<'a> {
    pub destination: &'a Path,
    pub overlay: Option<&'a Path>,
    /// `decisions × window`
    pub elapsed_secs: f64,
    pub cancel: Option<watch::Receiver<bool>>,
}

/// Creates the per-run sink and turns it into the destination file.
///
/// Every file a backend writes outside the destination must be registered
/// with the run's [`TempArtifacts`].
#[async_trait]
pub trait OutputBackend: Send + Sync {
    type Sink: WindowSink;

    fn create_sink(&self, artifacts: &mut TempArtifacts, source_count: usize) -> DirectorResult<Self::Sink>;

    /// Finalize the sink and write the destination. Returns its path.
    async fn finish(
        &self,
        sink: Self::Sink,
        artifacts: &mut TempArtifacts,
        request: FinishRequest<'_>,
    ) -> DirectorResult<PathBuf>;

    /// Drop the sink without producing output.
    fn abort(&self, sink: Self::Sink);
}

/// Opens sources with FFmpeg decode pipes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSourceOpener;

#[async_trait]
impl SourceOpener for FfmpegSourceOpener {
    type Source = SourceReader;

    async fn open(&self, index: usize, path: &Path, format: OutputFormat) -> MediaResult<SourceReader> {
        SourceReader::open(index, path, format).await
    }
}

/// Streams into FFmpeg encoders, mixes the audio and muxes the result.
#[derive(Debug, Clone)]
pub struct FfmpegOutput {
    format: OutputFormat,
    intermediate: EncodingConfig,
    final_encoding: EncodingConfig,
    overlay_height: u32,
    overlay_offset: (u32, u32),
    mux_timeout_secs: Option<u64>,
}

impl FfmpegOutput {
    pub fn from_config(config: &DirectorConfig) -> Self {
        Self {
            format: config.output,
            intermediate: config.intermediate.clone(),
            final_encoding: config.final_encoding.clone(),
            overlay_height: config.overlay_height,
            overlay_offset: config.overlay_offset,
            mux_timeout_secs: config.mux_timeout_secs,
        }
    }

    fn runner(&self, cancel: Option<watch::Receiver<bool>>) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(cancel) = cancel {
            runner = runner.with_cancel(cancel);
        }
        if let Some(secs) = self.mux_timeout_secs {
            runner = runner.with_timeout(secs);
        }
        runner
    }

    fn overlay(&self, logo: &Path) -> OverlayConfig {
        let (x, y) = self.overlay_offset;
        OverlayConfig::new(logo)
            .with_height(self.overlay_height)
            .with_offset(x, y)
    }
}

#[async_trait]
impl OutputBackend for FfmpegOutput {
    type Sink = OutputAssembler;

    fn create_sink(&self, artifacts: &mut TempArtifacts, source_count: usize) -> DirectorResult<OutputAssembler> {
        OutputAssembler::create(artifacts, source_count, self.format, &self.intermediate)
    }

    async fn finish(
        &self,
        sink: OutputAssembler,
        artifacts: &mut TempArtifacts,
        request: FinishRequest<'_>,
    ) -> DirectorResult<PathBuf> {
        let runner = self.runner(request.cancel);
        let output = sink.finalize(artifacts, &runner, request.elapsed_secs).await?;

        let overlay = request.overlay.map(|logo| self.overlay(logo));
        let staging = artifacts.register(
            ArtifactRole::Final,
            None,
            request.destination.extension().and_then(|e| e.to_str()),
        );

        let started = Instant::now();
        let destination = mux_final(
            &runner,
            &MuxRequest {
                video: &output.video,
                audio: &output.mixed_audio,
                overlay: overlay.as_ref(),
                encoding: &self.final_encoding,
                expected_secs: request.elapsed_secs,
            },
            &staging,
            request.destination,
        )
        .await
        .map_err(DirectorError::mux)?;
        metrics::record_ffmpeg_duration("mux", started.elapsed().as_secs_f64());

        Ok(destination)
    }

    fn abort(&self, sink: OutputAssembler) {
        sink.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_from_config() {
        let config = DirectorConfig {
            overlay_height: 72,
            overlay_offset: (40, 10),
            ..Default::default()
        };
        let overlay = FfmpegOutput::from_config(&config).overlay(Path::new("logo.png"));

        assert_eq!(overlay.image_path, PathBuf::from("logo.png"));
        assert_eq!(overlay.height, 72);
        assert_eq!((overlay.offset_x, overlay.offset_y), (40, 10));
    }
}
