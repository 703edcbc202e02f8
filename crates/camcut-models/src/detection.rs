//! Detections reported by a content scorer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// COCO class id of a person.
pub const CLASS_PERSON: usize = 0;

/// COCO class id of a truck. At ice venues this is what the ice resurfacer
/// gets classified as.
pub const CLASS_TRUCK: usize = 7;

/// Axis-aligned region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Region {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Build from top-left corner and size.
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    /// Area in square pixels. Degenerate regions have zero area.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another region.
    pub fn iou(&self, other: &Region) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One detected entity in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// COCO class id
    pub class_id: usize,
    /// Bounding region in pixels
    pub region: Region,
    /// Detection confidence [0, 1]
    pub confidence: f32,
}

impl Detection {
    pub fn new(class_id: usize, region: Region, confidence: f32) -> Self {
        Self {
            class_id,
            region,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Region area weighted by confidence.
    pub fn weighted_area(&self) -> f64 {
        self.region.area() as f64 * self.confidence as f64
    }
}
