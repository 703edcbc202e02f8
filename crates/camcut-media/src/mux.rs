//! Final mux of the assembled video and mixed audio, with optional logo.

use camcut_models::EncodingConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;

/// Logo overlay placed in the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Path to the logo image (PNG with transparency)
    pub image_path: PathBuf,
    /// Logo height in pixels; width follows the aspect ratio
    pub height: u32,
    /// Offset from the left edge (pixels)
    pub offset_x: u32,
    /// Offset from the top edge (pixels)
    pub offset_y: u32,
}

impl OverlayConfig {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            height: 50,
            offset_x: 25,
            offset_y: 25,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn with_offset(mut self, x: u32, y: u32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !self.image_path.is_file() {
            return Err(MediaError::FileNotFound(self.image_path.clone()));
        }
        Ok(())
    }

    fn filter(&self) -> String {
        format!(
            "[2:v]scale=-1:{}[logo];[0:v][logo]overlay={}:{}[outv]",
            self.height, self.offset_x, self.offset_y
        )
    }
}

/// Inputs of the final mux.
#[derive(Debug, Clone)]
pub struct MuxRequest<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub overlay: Option<&'a OverlayConfig>,
    /// Used only when the overlay forces a video re-encode
    pub encoding: &'a EncodingConfig,
    /// Length of the output, for progress reporting
    pub expected_secs: f64,
}

/// Build the mux command writing to `output`.
pub fn mux_command(request: &MuxRequest<'_>, output: &Path) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(request.video, output).add_input(request.audio);

    let cmd = match request.overlay {
        Some(overlay) => cmd
            .add_input(&overlay.image_path)
            .filter_complex(overlay.filter())
            .map("[outv]")
            .map("1:a:0")
            .output_args(request.encoding.video_args())
            .output_args(["-pix_fmt", "yuv420p"])
            .audio_codec("copy"),
        None => cmd
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_codec("copy"),
    };
    cmd.output_args(["-movflags", "+faststart"])
}

/// Mux into `staging`, then move the result to `destination`.
///
/// The destination is only touched once the encode has succeeded.
pub async fn mux_final(
    runner: &FfmpegRunner,
    request: &MuxRequest<'_>,
    staging: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let staging = staging.as_ref();
    let destination = destination.as_ref();

    if let Some(overlay) = request.overlay {
        overlay.validate()?;
    }

    let cmd = mux_command(request, staging);
    info!(
        video = %request.video.display(),
        audio = %request.audio.display(),
        overlay = request.overlay.is_some(),
        "Muxing final output"
    );

    let expected_secs = request.expected_secs;
    runner
        .run_with_progress(&cmd, move |progress| {
            debug!(
                out_secs = progress.out_secs(),
                percent = progress.percent_of(expected_secs),
                speed = progress.speed,
                "Mux progress"
            );
        })
        .await?;

    move_file(staging, destination).await?;
    info!(destination = %destination.display(), "Output written");
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mux_without_overlay_copies_streams() {
        let encoding = EncodingConfig::final_output();
        let request = MuxRequest {
            video: Path::new("tmp_merged.mp4"),
            audio: Path::new("tmp_mixed.m4a"),
            overlay: None,
            encoding: &encoding,
            expected_secs: 6.0,
        };
        let args = mux_command(&request, Path::new("tmp_final.mp4"))
            .build_args()
            .join(" ");

        assert!(args.contains("-i tmp_merged.mp4 -i tmp_mixed.m4a"));
        assert!(args.contains("-map 0:v:0 -map 1:a:0 -c:v copy -c:a copy"));
        assert!(!args.contains("filter_complex"));
    }

    #[test]
    fn test_mux_with_overlay_reencodes_video() {
        let encoding = EncodingConfig::final_output();
        let overlay = OverlayConfig::new("logo.png");
        let request = MuxRequest {
            video: Path::new("tmp_merged.mp4"),
            audio: Path::new("tmp_mixed.m4a"),
            overlay: Some(&overlay),
            encoding: &encoding,
            expected_secs: 6.0,
        };
        let args = mux_command(&request, Path::new("tmp_final.mp4"))
            .build_args()
            .join(" ");

        assert!(args.contains("-i logo.png"));
        assert!(args.contains("[2:v]scale=-1:50[logo];[0:v][logo]overlay=25:25[outv]"));
        assert!(args.contains("-c:v libx264 -preset veryfast"));
        assert!(args.contains("-c:a copy"));
    }

    #[test]
    fn test_overlay_builder() {
        let overlay = OverlayConfig::new("logo.png").with_height(80).with_offset(10, 12);
        assert_eq!(overlay.filter(), "[2:v]scale=-1:80[logo];[0:v][logo]overlay=10:12[outv]");
    }

    #[test]
    fn test_overlay_missing_image() {
        let err = OverlayConfig::new("/no/logo.png").validate().unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
