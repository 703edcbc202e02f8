//! Per-frame activity metrics and the score derived from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, CLASS_PERSON, CLASS_TRUCK};

/// Which detector classes feed the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoringClasses {
    /// Primary class, drives the score
    pub target: usize,
    /// Auxiliary class, counted but not scored
    pub secondary: usize,
}

impl Default for ScoringClasses {
    fn default() -> Self {
        Self {
            target: CLASS_PERSON,
            secondary: CLASS_TRUCK,
        }
    }
}

impl ScoringClasses {
    /// Whether a detection of this class is relevant to scoring at all.
    pub fn is_relevant(&self, class_id: usize) -> bool {
        class_id == self.target || class_id == self.secondary
    }
}

/// Structured score inputs for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameMetrics {
    /// Number of target-class detections
    pub target_count: u32,
    /// Sum of area × confidence over target-class detections
    pub target_weighted_area: f64,
    /// Number of secondary-class detections
    pub secondary_count: u32,
}

impl FrameMetrics {
    /// Aggregate detections into metrics. Detections of other classes are ignored.
    pub fn from_detections(detections: &[Detection], classes: ScoringClasses) -> Self {
        let mut metrics = Self::default();
        for detection in detections {
            if detection.class_id == classes.target {
                metrics.target_count += 1;
                metrics.target_weighted_area += detection.weighted_area();
            } else if detection.class_id == classes.secondary {
                metrics.secondary_count += 1;
            }
        }
        metrics
    }

    /// `floor(target_count × target_weighted_area)`.
    ///
    /// Rewards both how many targets are in view and how prominent they are.
    pub fn score(&self) -> i64 {
        (self.target_count as f64 * self.target_weighted_area).floor() as i64
    }
}
