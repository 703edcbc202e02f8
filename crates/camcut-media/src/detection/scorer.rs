//! The content-scoring seam.

use camcut_models::{Detection, FrameMetrics, ScoringClasses};

use crate::error::MediaResult;
use crate::frame::Frame;

/// Analyses one frame and reports the entities in it.
///
/// Implementations are synchronous and are expected to return in bounded
/// time. They are constructed once per run and shared by reference.
pub trait ContentScorer: Send + Sync {
    /// Detect entities in `frame`. Regions are in the frame's pixel space.
    fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>>;

    /// Short name for logs.
    fn name(&self) -> &'static str {
        "content-scorer"
    }
}

impl<T: ContentScorer + ?Sized> ContentScorer for Box<T> {
    fn detect(&self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Run the scorer on a frame and aggregate the result into metrics.
pub fn measure_frame(
    scorer: &dyn ContentScorer,
    frame: &Frame,
    classes: ScoringClasses,
) -> MediaResult<FrameMetrics> {
    let detections = scorer.detect(frame)?;
    Ok(FrameMetrics::from_detections(&detections, classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camcut_models::{Region, CLASS_PERSON};

    struct FixedScorer(Vec<Detection>);

    impl ContentScorer for FixedScorer {
        fn detect(&self, _frame: &Frame) -> MediaResult<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_measure_frame() {
        let scorer = FixedScorer(vec![
            Detection::new(CLASS_PERSON, Region::from_xywh(0.0, 0.0, 2.0, 3.0), 1.0),
            Detection::new(CLASS_PERSON, Region::from_xywh(5.0, 5.0, 1.0, 1.0), 0.5),
        ]);
        let frame = Frame::from_rgb(1, 1, vec![0; 3]).unwrap();

        let metrics = measure_frame(&scorer, &frame, ScoringClasses::default()).unwrap();
        assert_eq!(metrics.target_count, 2);
        // floor(2 × 6.5)
        assert_eq!(metrics.score(), 13);
        assert_eq!(scorer.name(), "content-scorer");
    }
}
