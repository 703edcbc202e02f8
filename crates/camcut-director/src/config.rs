//! Director configuration.

use camcut_media::ObjectDetectorConfig;
use camcut_models::{
    EncodingConfig, OutputFormat, ScoringClasses, CLASS_PERSON, CLASS_TRUCK, DEFAULT_WINDOW_SECS,
};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{DirectorError, DirectorResult};

/// Director configuration.
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    /// Window length in seconds
    pub window_secs: f64,
    /// Format every source is decoded into and the output is written in
    pub output: OutputFormat,
    /// Directory for temporary artifacts
    pub temp_dir: PathBuf,
    /// YOLOv8 ONNX model
    pub model_path: PathBuf,
    /// Detector confidence threshold
    pub confidence_threshold: f32,
    /// Detector NMS IoU threshold
    pub nms_threshold: f32,
    /// Target and secondary detector classes
    pub classes: ScoringClasses,
    /// Encoder settings for intermediate artifacts
    pub intermediate: EncodingConfig,
    /// Encoder settings for the destination when it has to be re-encoded
    pub final_encoding: EncodingConfig,
    /// Capacity of the progress channel
    pub progress_buffer: usize,
    /// Kill the final mux after this many seconds
    pub mux_timeout_secs: Option<u64>,
    /// Logo height in pixels
    pub overlay_height: u32,
    /// Logo offset from the top-left corner, `(x, y)` in pixels
    pub overlay_offset: (u32, u32),
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            output: OutputFormat::default(),
            temp_dir: PathBuf::from("temp"),
            model_path: PathBuf::from("models/yolov8n.onnx"),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            classes: ScoringClasses {
                target: CLASS_PERSON,
                secondary: CLASS_TRUCK,
            },
            intermediate: EncodingConfig::intermediate(),
            final_encoding: EncodingConfig::final_output(),
            progress_buffer: 64,
            mux_timeout_secs: None,
            overlay_height: 50,
            overlay_offset: (25, 25),
        }
    }
}

/// Parse `key` from the environment, falling back when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl DirectorConfig {
    /// Create config from `CAMCUT_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut intermediate = defaults.intermediate.clone();
        intermediate.codec = env_or("CAMCUT_INTERMEDIATE_CODEC", intermediate.codec);
        intermediate.preset = env_or("CAMCUT_INTERMEDIATE_PRESET", intermediate.preset);

        let mut final_encoding = defaults.final_encoding.clone();
        final_encoding.codec = env_or("CAMCUT_FINAL_CODEC", final_encoding.codec);
        final_encoding.preset = env_or("CAMCUT_FINAL_PRESET", final_encoding.preset);
        final_encoding.crf = std::env::var("CAMCUT_FINAL_CRF")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(final_encoding.crf);

        Self {
            window_secs: env_or("CAMCUT_WINDOW_SECS", defaults.window_secs),
            output: OutputFormat {
                width: env_or("CAMCUT_OUTPUT_WIDTH", defaults.output.width),
                height: env_or("CAMCUT_OUTPUT_HEIGHT", defaults.output.height),
                fps: env_or("CAMCUT_OUTPUT_FPS", defaults.output.fps),
                sample_rate: env_or("CAMCUT_SAMPLE_RATE", defaults.output.sample_rate),
                channels: env_or("CAMCUT_CHANNELS", defaults.output.channels),
            },
            temp_dir: std::env::var("CAMCUT_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            model_path: std::env::var("CAMCUT_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            confidence_threshold: env_or(
                "CAMCUT_CONFIDENCE_THRESHOLD",
                defaults.confidence_threshold,
            ),
            nms_threshold: env_or("CAMCUT_NMS_THRESHOLD", defaults.nms_threshold),
            classes: ScoringClasses {
                target: env_or("CAMCUT_TARGET_CLASS", defaults.classes.target),
                secondary: env_or("CAMCUT_SECONDARY_CLASS", defaults.classes.secondary),
            },
            intermediate,
            final_encoding,
            progress_buffer: env_or("CAMCUT_PROGRESS_BUFFER", defaults.progress_buffer),
            mux_timeout_secs: std::env::var("CAMCUT_MUX_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            overlay_height: env_or("CAMCUT_OVERLAY_HEIGHT", defaults.overlay_height),
            overlay_offset: (
                env_or("CAMCUT_OVERLAY_X", defaults.overlay_offset.0),
                env_or("CAMCUT_OVERLAY_Y", defaults.overlay_offset.1),
            ),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> DirectorResult<()> {
        if !(self.window_secs > 0.0) {
            return Err(DirectorError::config_error(format!(
                "window must be positive, got {}",
                self.window_secs
            )));
        }
        if !(self.output.fps > 0.0) {
            return Err(DirectorError::config_error(format!(
                "output fps must be positive, got {}",
                self.output.fps
            )));
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(DirectorError::config_error("output size must be non-zero"));
        }
        if self.output.sample_rate == 0 || self.output.channels == 0 {
            return Err(DirectorError::config_error(
                "audio sample rate and channel count must be non-zero",
            ));
        }
        if !self.output.fits_window(self.window_secs) {
            return Err(DirectorError::config_error(format!(
                "a {}s window must be a whole, non-zero number of frames at {} fps and of samples at {} Hz",
                self.window_secs,
                self.output.frame_rate(),
                self.output.sample_rate
            )));
        }
        if self.overlay_height == 0 {
            return Err(DirectorError::config_error("overlay height must be non-zero"));
        }
        if self.progress_buffer == 0 {
            return Err(DirectorError::config_error("progress buffer must be non-zero"));
        }
        Ok(())
    }

    /// Detector settings derived from this config.
    pub fn detector_config(&self) -> ObjectDetectorConfig {
        ObjectDetectorConfig {
            model_path: self.model_path.clone(),
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            classes: self.classes,
            ..ObjectDetectorConfig::default()
        }
    }
}
