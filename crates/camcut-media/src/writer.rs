//! Streaming writers that encode raw frames and samples through FFmpeg stdin.

use camcut_models::{EncodingConfig, OutputFormat};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::command::{collect_stderr, FfmpegCommand, PIPE_IN};
use crate::error::{MediaError, MediaResult};
use crate::frame::{AudioBlock, Frame};

/// An FFmpeg child reading raw data from stdin.
///
/// Dropping an unfinished encoder kills the child.
struct StdinEncoder {
    output: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
}

impl StdinEncoder {
    fn spawn(cmd: FfmpegCommand) -> MediaResult<Self> {
        let mut child = cmd.spawn_piped(true, false)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdin not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;

        debug!(output = %cmd.output_path().display(), "Encoder started");

        Ok(Self {
            output: cmd.output_path().to_path_buf(),
            child,
            stdin: Some(stdin),
            stderr: Some(collect_stderr(stderr)),
        })
    }

    async fn write(&mut self, bytes: &[u8]) -> MediaResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("Encoder already finished"))?;

        if let Err(e) = stdin.write_all(bytes).await {
            // Broken pipe means the encoder died; report its stderr instead
            let diagnostics = self.take_diagnostics().await;
            return Err(MediaError::ffmpeg_failed(
                format!("Encoder for {} stopped accepting data: {}", self.output.display(), e),
                diagnostics,
                None,
            ));
        }
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<PathBuf> {
        if let Some(mut stdin) = self.stdin.take() {
            // EOF on stdin lets FFmpeg flush and exit
            let _ = stdin.shutdown().await;
        }

        let status = self.child.wait().await?;
        let diagnostics = self.take_diagnostics().await;

        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("Encoding {} failed", self.output.display()),
                diagnostics,
                status.code(),
            ));
        }

        debug!(output = %self.output.display(), "Encoder finished");
        Ok(self.output.clone())
    }

    async fn take_diagnostics(&mut self) -> Option<String> {
        let handle = self.stderr.take()?;
        if !handle.is_finished() {
            let _ = self.child.kill().await;
        }
        handle.await.ok().filter(|s| !s.is_empty())
    }
}

/// Append-only video artifact fed with RGB24 frames.
pub struct VideoWriter {
    encoder: StdinEncoder,
    format: OutputFormat,
    frames_written: u64,
}

impl VideoWriter {
    /// Build the encode command for a video artifact.
    pub fn command(output: &Path, format: &OutputFormat, encoding: &EncodingConfig) -> FfmpegCommand {
        FfmpegCommand::new(PIPE_IN, output)
            .without_progress()
            .input_args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .input_args(["-s".to_string(), format.size_arg()])
            .input_args(["-r".to_string(), format.frame_rate().to_string()])
            .output_args(encoding.video_args())
            .output_args(["-pix_fmt", "yuv420p", "-an"])
    }

    pub fn create(
        output: impl AsRef<Path>,
        format: OutputFormat,
        encoding: &EncodingConfig,
    ) -> MediaResult<Self> {
        let cmd = Self::command(output.as_ref(), &format, encoding);
        Ok(Self {
            encoder: StdinEncoder::spawn(cmd)?,
            format,
            frames_written: 0,
        })
    }

    /// Append frames in order. Frames must match the output format.
    pub async fn append(&mut self, frames: &[Frame]) -> MediaResult<()> {
        for frame in frames {
            if frame.width != self.format.width || frame.height != self.format.height {
                return Err(MediaError::invalid_frame(format!(
                    "frame is {}x{}, writer expects {}",
                    frame.width,
                    frame.height,
                    self.format.size_arg()
                )));
            }
            self.encoder.write(&frame.data).await?;
            self.frames_written += 1;
        }
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Seconds of video written so far.
    pub fn duration_secs(&self) -> f64 {
        match self.format.frame_rate() {
            0 => 0.0,
            rate => self.frames_written as f64 / rate as f64,
        }
    }

    /// Close stdin and wait for the encoder. Returns the artifact path.
    pub async fn finish(mut self) -> MediaResult<PathBuf> {
        self.encoder.finish().await
    }
}

/// Append-only audio artifact fed with s16le sample blocks.
pub struct AudioWriter {
    encoder: StdinEncoder,
    format: OutputFormat,
    sample_frames_written: u64,
}

impl AudioWriter {
    /// Build the encode command for an audio artifact.
    pub fn command(output: &Path, format: &OutputFormat, encoding: &EncodingConfig) -> FfmpegCommand {
        FfmpegCommand::new(PIPE_IN, output)
            .without_progress()
            .input_args(["-f", "s16le"])
            .input_args(["-ar".to_string(), format.sample_rate.to_string()])
            .input_args(["-ac".to_string(), format.channels.to_string()])
            .output_args(encoding.audio_args())
            .no_video()
    }

    pub fn create(
        output: impl AsRef<Path>,
        format: OutputFormat,
        encoding: &EncodingConfig,
    ) -> MediaResult<Self> {
        let cmd = Self::command(output.as_ref(), &format, encoding);
        Ok(Self {
            encoder: StdinEncoder::spawn(cmd)?,
            format,
            sample_frames_written: 0,
        })
    }

    pub async fn append(&mut self, block: &AudioBlock) -> MediaResult<()> {
        if block.channels != self.format.channels || block.sample_rate != self.format.sample_rate {
            return Err(MediaError::invalid_frame(format!(
                "audio block is {} Hz x{}, writer expects {} Hz x{}",
                block.sample_rate, block.channels, self.format.sample_rate, self.format.channels
            )));
        }
        if block.is_empty() {
            return Ok(());
        }
        self.encoder.write(&block.to_le_bytes()).await?;
        self.sample_frames_written += block.frame_count() as u64;
        Ok(())
    }

    /// Seconds of audio written so far.
    pub fn duration_secs(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.sample_frames_written as f64 / self.format.sample_rate as f64
    }

    pub async fn finish(mut self) -> MediaResult<PathBuf> {
        self.encoder.finish().await
    }
}
