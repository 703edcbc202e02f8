//! Encoding and output-format configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::window::{frames_per_window, samples_per_window};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Preset for intermediate artifacts (speed over size)
pub const INTERMEDIATE_PRESET: &str = "ultrafast";
/// Preset for the final output when re-encoding is needed
pub const FINAL_PRESET: &str = "veryfast";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Default encoder thread count
pub const DEFAULT_THREADS: u32 = 4;

/// Default output resolution and rates
pub const DEFAULT_OUTPUT_WIDTH: u32 = 1920;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 1080;
pub const DEFAULT_OUTPUT_FPS: f64 = 30.0;
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNELS: u16 = 2;

/// Video/audio encoder settings for one ffmpeg invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "ultrafast", "veryfast")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor, encoder default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Encoder threads
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    FINAL_PRESET.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_threads() -> u32 {
    DEFAULT_THREADS
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::final_output()
    }
}

impl EncodingConfig {
    /// Settings for intermediate artifacts written during the window loop.
    pub fn intermediate() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: INTERMEDIATE_PRESET.to_string(),
            crf: None,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            threads: DEFAULT_THREADS,
            extra_args: Vec::new(),
        }
    }

    /// Settings for the destination file.
    pub fn final_output() -> Self {
        Self {
            preset: FINAL_PRESET.to_string(),
            ..Self::intermediate()
        }
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Returns a new config with a different video codec.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Video encoder arguments.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        if let Some(crf) = self.crf {
            // NVENC takes -cq instead of -crf
            let flag = if self.codec.contains("nvenc") { "-cq" } else { "-crf" };
            args.extend_from_slice(&[flag.to_string(), crf.to_string()]);
        }

        args.extend_from_slice(&["-threads".to_string(), self.threads.to_string()]);
        args
    }

    /// Audio encoder arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Convert to FFmpeg output arguments (video, audio, extras).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args.extend(self.extra_args.clone());
        args
    }
}

/// Fixed format of the assembled output.
///
/// Every source is decoded into this format so that frames and sample blocks
/// from different feeds can be appended to the same streams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            width: DEFAULT_OUTPUT_WIDTH,
            height: DEFAULT_OUTPUT_HEIGHT,
            fps: DEFAULT_OUTPUT_FPS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
        }
    }
}

impl OutputFormat {
    /// Bytes in one packed RGB24 frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Bytes in one s16le sample frame (all channels).
    pub fn sample_frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }

    /// Frame size as `WxH`.
    pub fn size_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Integer rate frames are decoded, counted and encoded at.
    ///
    /// `29.97` becomes `30`, so a window of `W` seconds holds exactly
    /// `30 × W` frames and also lasts `W` seconds once encoded.
    pub fn frame_rate(&self) -> u32 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps.round() as u32
        } else {
            0
        }
    }

    /// Frames in one window of `window_secs`.
    pub fn frames_per_window(&self, window_secs: f64) -> usize {
        frames_per_window(self.fps, window_secs)
    }

    /// Sample frames in one window of `window_secs`.
    pub fn samples_per_window(&self, window_secs: f64) -> usize {
        samples_per_window(self.sample_rate, window_secs)
    }

    /// Whether a window is a whole, non-zero number of frames and samples.
    ///
    /// Only then do the video and audio of `n` windows both last exactly
    /// `n × window_secs`.
    pub fn fits_window(&self, window_secs: f64) -> bool {
        let frames = self.frames_per_window(window_secs);
        let samples = self.samples_per_window(window_secs);
        if frames == 0 || samples == 0 {
            return false;
        }
        let video_secs = frames as f64 / self.frame_rate() as f64;
        let audio_secs = samples as f64 / self.sample_rate as f64;
        (video_secs - window_secs).abs() < WINDOW_EPSILON
            && (audio_secs - window_secs).abs() < WINDOW_EPSILON
    }
}

/// Tolerance when comparing window lengths in seconds.
const WINDOW_EPSILON: f64 = 1e-9;
