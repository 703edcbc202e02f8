//! FFmpeg decode pipes: one child process per part and track.

use async_trait::async_trait;
use camcut_models::OutputFormat;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::track::{PartOpener, PartStream};
use crate::command::{collect_stderr, FfmpegCommand, PIPE_OUT};
use crate::error::{MediaError, MediaResult};

/// Which track a decode pipe produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    /// Packed RGB24 frames, letterboxed and resampled to the output format
    Video,
    /// Interleaved s16le samples at the output rate and channel count
    Audio,
}

/// Opens decode pipes for one track kind.
#[derive(Debug, Clone)]
pub struct FfmpegPartOpener {
    kind: DecodeKind,
    format: OutputFormat,
}

impl FfmpegPartOpener {
    pub fn new(kind: DecodeKind, format: OutputFormat) -> Self {
        Self { kind, format }
    }

    /// Build the decode command for `part`.
    pub fn command(&self, part: &Path) -> FfmpegCommand {
        let format = &self.format;
        let base = FfmpegCommand::new(part, PIPE_OUT).without_progress();

        match self.kind {
            DecodeKind::Video => base
                .map("0:v:0")
                .video_filter(letterbox_filter(format))
                .output_args(["-an", "-sn"])
                .format("rawvideo")
                .output_args(["-pix_fmt", "rgb24"]),
            DecodeKind::Audio => base
                .map("0:a:0")
                .no_video()
                .output_args(["-sn", "-acodec", "pcm_s16le"])
                .output_args(["-ar".to_string(), format.sample_rate.to_string()])
                .output_args(["-ac".to_string(), format.channels.to_string()])
                .format("s16le"),
        }
    }
}

/// Scale into the output box keeping aspect ratio, pad the rest black, and
/// resample to the output frame rate.
pub(crate) fn letterbox_filter(format: &OutputFormat) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = format.width,
        h = format.height,
        fps = format.frame_rate()
    )
}

#[async_trait]
impl PartOpener for FfmpegPartOpener {
    type Stream = FfmpegPipe;

    async fn open(&self, part: &Path) -> MediaResult<FfmpegPipe> {
        let mut child = self.command(part).spawn_piped(false, true)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;

        debug!(part = %part.display(), kind = ?self.kind, "Decode pipe opened");

        Ok(FfmpegPipe {
            part: part.to_path_buf(),
            child: Some(child),
            stdout: Some(stdout),
            stderr: Some(collect_stderr(stderr)),
            bytes_read: 0,
        })
    }
}

/// Decoded output of one FFmpeg child.
pub struct FfmpegPipe {
    part: PathBuf,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    bytes_read: u64,
}

impl FfmpegPipe {
    /// Wait for the child after end of stream. A decoder that fails before
    /// producing any data is an error; a failure later ends the part early.
    async fn reap(&mut self) -> MediaResult<()> {
        self.stdout.take();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().await?;
        let diagnostics = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            return Ok(());
        }

        if self.bytes_read == 0 {
            return Err(MediaError::ffmpeg_failed(
                format!("Failed to decode {}", self.part.display()),
                (!diagnostics.is_empty()).then_some(diagnostics),
                status.code(),
            ));
        }

        warn!(
            part = %self.part.display(),
            exit_code = ?status.code(),
            stderr = %diagnostics,
            "Decoder exited with an error, treating as end of part"
        );
        Ok(())
    }
}

#[async_trait]
impl PartStream for FfmpegPipe {
    async fn read_fill(&mut self, buf: &mut [u8]) -> MediaResult<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(0);
        };

        let mut filled = 0;
        while filled < buf.len() {
            let n = stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.bytes_read += filled as u64;

        if filled < buf.len() {
            self.reap().await?;
        }
        Ok(filled)
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.stdout.take();
        if let Some(mut child) = self.child.take() {
            // Still running when closed early: stop it
            if child.try_wait()?.is_none() {
                let _ = child.kill().await;
            }
        }
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_decode_command() {
        let opener = FfmpegPartOpener::new(DecodeKind::Video, OutputFormat::default());
        let args = opener.command(Path::new("cam0.mp4")).build_args();
        let joined = args.join(" ");

        assert!(joined.contains("-i cam0.mp4"));
        assert!(joined.contains("-map 0:v:0"));
        assert!(joined.contains("force_original_aspect_ratio=decrease"));
        assert!(joined.contains("pad=1920:1080"));
        assert!(joined.contains("fps=30"));
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24"));
        assert_eq!(args.last().unwrap(), "pipe:1");
        assert!(!args.contains(&"-progress".to_string()));
    }

    #[test]
    fn test_video_decode_resamples_to_integer_rate() {
        let format = OutputFormat {
            fps: 59.94,
            ..OutputFormat::default()
        };
        assert!(letterbox_filter(&format).ends_with(",fps=60"));
    }

    #[test]
    fn test_audio_decode_command() {
        let format = OutputFormat {
            sample_rate: 48000,
            channels: 1,
            ..OutputFormat::default()
        };
        let opener = FfmpegPartOpener::new(DecodeKind::Audio, format);
        let joined = opener.command(Path::new("cam1.mp4")).build_args().join(" ");

        assert!(joined.contains("-map 0:a:0 -vn"));
        assert!(joined.contains("-ar 48000"));
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-f s16le pipe:1"));
    }
}
