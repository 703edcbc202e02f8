//! Object detection using a YOLOv8 ONNX model.
//!
//! Execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (`cuda` feature)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use camcut_models::{Detection, Region, ScoringClasses};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb};
use ndarray::ArrayView2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::scorer::ContentScorer;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;

/// YOLOv8 output layout: 4 box features + 80 class scores, 8400 candidates.
const NUM_CLASSES: usize = 80;
const NUM_FEATURES: usize = 4 + NUM_CLASSES;
const NUM_BOXES: usize = 8400;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    /// Path to ONNX model file
    pub model_path: PathBuf,
    /// Confidence threshold for detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
    /// Only these classes are reported
    pub classes: ScoringClasses,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n.onnx"),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
            classes: ScoringClasses::default(),
        }
    }
}

/// Object detector using a YOLOv8 ONNX model.
pub struct ObjectDetector {
    session: Mutex<Session>,
    config: ObjectDetectorConfig,
}

impl ObjectDetector {
    /// Load the model. A missing model file is `ModelNotFound`.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        if !config.model_path.is_file() {
            return Err(MediaError::model_not_found(
                config.model_path.display().to_string(),
            ));
        }

        let session = Mutex::new(create_session(&config.model_path)?);
        info!(
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            "Object detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }

    /// Resize to the model input, normalize to [0, 1], lay out as NCHW.
    fn preprocess(&self, frame: &Frame) -> MediaResult<Value> {
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
                .ok_or_else(|| MediaError::invalid_frame("frame does not match its dimensions"))?;

        let size = self.config.input_size;
        let resized = DynamicImage::ImageRgb8(buffer)
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();

        let (w, h) = (size as usize, size as usize);
        let mut chw: Vec<f32> = vec![0.0; 3 * h * w];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for c in 0..3 {
                chw[c * h * w + offset] = pixel[c] as f32 / 255.0;
            }
        }

        Tensor::from_array((vec![1usize, 3, h, w], chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }

    /// Decode `[1, 84, 8400]` into pixel-space detections of the configured classes.
    fn postprocess(&self, outputs: &[f32], width: u32, height: u32) -> MediaResult<Vec<Detection>> {
        let candidates = decode_candidates(
            outputs,
            self.config.input_size as f32,
            width as f32,
            height as f32,
            self.config.confidence_threshold,
            self.config.classes,
        )?;
        Ok(non_maximum_suppression(candidates, self.config.nms_threshold))
    }
}

impl ContentScorer for ObjectDetector {
    fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let detections = self.postprocess(&outputs, frame.width, frame.height)?;

        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "yolov8"
    }
}

fn decode_candidates(
    outputs: &[f32],
    input_size: f32,
    width: f32,
    height: f32,
    confidence_threshold: f32,
    classes: ScoringClasses,
) -> MediaResult<Vec<Detection>> {
    // Rows are features, columns are candidate boxes
    let features = ArrayView2::from_shape((NUM_FEATURES, NUM_BOXES), outputs).map_err(|e| {
        MediaError::detection_failed(format!(
            "Unexpected output size {} ({})",
            outputs.len(),
            e
        ))
    })?;

    let scale_w = width / input_size;
    let scale_h = height / input_size;
    let mut candidates = Vec::new();

    for i in 0..NUM_BOXES {
        let (best_class, best_score) = (0..NUM_CLASSES)
            .map(|c| (c, features[[4 + c, i]]))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if best_score < confidence_threshold || !classes.is_relevant(best_class) {
            continue;
        }

        let (cx, cy) = (features[[0, i]], features[[1, i]]);
        let (w, h) = (features[[2, i]], features[[3, i]]);

        let region = Region::new(
            ((cx - w / 2.0) * scale_w).clamp(0.0, width),
            ((cy - h / 2.0) * scale_h).clamp(0.0, height),
            ((cx + w / 2.0) * scale_w).clamp(0.0, width),
            ((cy + h / 2.0) * scale_h).clamp(0.0, height),
        );
        candidates.push(Detection::new(best_class, region, best_score));
    }

    Ok(candidates)
}

/// Per-class NMS, highest confidence first.
fn non_maximum_suppression(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.region.iou(&candidate.region) > threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

/// Create an ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}
