//! Content scoring: the scorer seam and the YOLOv8 object detector.

pub mod object_detector;
pub mod scorer;

pub use object_detector::{ObjectDetector, ObjectDetectorConfig, COCO_CLASSES};
pub use scorer::{measure_frame, ContentScorer};
