//! Output assembly: streams window output into intermediate artifacts.

use async_trait::async_trait;
use camcut_media::{
    mix_audio_tracks, AudioBlock, AudioWriter, FfmpegRunner, Frame, MediaError, VideoWriter,
};
use camcut_models::{EncodingConfig, OutputFormat};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::WindowSink;
use crate::error::{DirectorError, DirectorResult};
use crate::lifecycle::{ArtifactRole, TempArtifacts};
use crate::metrics;

/// Paths of the finished intermediate artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledOutput {
    pub video: PathBuf,
    pub mixed_audio: PathBuf,
}

/// One open video writer plus one audio writer per source.
pub struct OutputAssembler {
    video: VideoWriter,
    audio: Vec<AudioWriter>,
    format: OutputFormat,
    encoding: EncodingConfig,
}

impl OutputAssembler {
    /// Register the `merged` and per-source `audio` artifacts and start
    /// their encoders.
    pub fn create(
        artifacts: &mut TempArtifacts,
        source_count: usize,
        format: OutputFormat,
        encoding: &EncodingConfig,
    ) -> DirectorResult<Self> {
        let video_path = artifacts.register(ArtifactRole::Merged, None, None);
        let video = VideoWriter::create(&video_path, format, encoding)?;

        let audio = (0..source_count)
            .map(|index| {
                let path = artifacts.register(ArtifactRole::Audio, Some(index), None);
                AudioWriter::create(&path, format, encoding)
            })
            .collect::<Result<Vec<_>, MediaError>>()?;

        debug!(sources = source_count, "Output assembler ready");
        Ok(Self {
            video,
            audio,
            format,
            encoding: encoding.clone(),
        })
    }

    /// Stop all encoders without producing output.
    pub fn abort(self) {
        // Writers kill their encoders on drop
        debug!("Output assembler aborted");
    }

    /// Finish every writer and mix the audio, clamped to `elapsed_secs`.
    pub async fn finalize(
        self,
        artifacts: &mut TempArtifacts,
        runner: &FfmpegRunner,
        elapsed_secs: f64,
    ) -> DirectorResult<AssembledOutput> {
        let started = Instant::now();
        let frames = self.video.frames_written();
        let video_secs = self.video.duration_secs();
        let frame_secs = match self.format.frame_rate() {
            0 => 0.0,
            rate => 1.0 / rate as f64,
        };
        if (video_secs - elapsed_secs).abs() > frame_secs {
            warn!(video_secs, elapsed_secs, "Video length differs from the selected windows");
        }
        let video = self.video.finish().await?;

        let mut audio_paths = Vec::with_capacity(self.audio.len());
        for (source_index, writer) in self.audio.into_iter().enumerate() {
            debug!(source_index, audio_secs = writer.duration_secs(), "Finishing audio track");
            audio_paths.push(writer.finish().await?);
        }
        metrics::record_ffmpeg_duration("encode", started.elapsed().as_secs_f64());

        let started = Instant::now();
        let mixed = artifacts.register(ArtifactRole::Mixed, None, None);
        let mixed_audio = mix_audio_tracks(
            runner,
            &audio_paths,
            &mixed,
            elapsed_secs,
            &self.format,
            &self.encoding,
        )
        .await
        .map_err(|e| match e {
            MediaError::Cancelled => DirectorError::Cancelled,
            other => DirectorError::Media(other),
        })?;
        metrics::record_ffmpeg_duration("mix", started.elapsed().as_secs_f64());

        info!(
            frames,
            video_secs,
            audio_tracks = audio_paths.len(),
            elapsed_secs,
            "Intermediate artifacts assembled"
        );
        Ok(AssembledOutput { video, mixed_audio })
    }
}

#[async_trait]
impl WindowSink for OutputAssembler {
    async fn append_video(&mut self, frames: &[Frame]) -> DirectorResult<()> {
        self.video.append(frames).await?;
        Ok(())
    }

    async fn append_audio(&mut self, source_index: usize, block: &AudioBlock) -> DirectorResult<()> {
        let writer = self.audio.get_mut(source_index).ok_or_else(|| {
            DirectorError::Media(MediaError::internal(format!(
                "no audio stream for source {}",
                source_index
            )))
        })?;
        writer.append(block).await?;
        Ok(())
    }
}
