//! Shared data models for the camcut director.
//!
//! This crate provides Serde-serializable types for:
//! - Run identity, outcome and summary
//! - Detections and the per-frame activity metrics derived from them
//! - Selection decisions and per-window progress records
//! - Window arithmetic (frames and samples per window)
//! - Encoding and output-format configuration

pub mod decision;
pub mod detection;
pub mod encoding;
pub mod frame_metrics;
pub mod run;
pub mod window;

// Re-export common types
pub use decision::{ProgressRecord, SelectionDecision};
pub use detection::{Detection, Region, CLASS_PERSON, CLASS_TRUCK};
pub use encoding::{EncodingConfig, OutputFormat};
pub use frame_metrics::{FrameMetrics, ScoringClasses};
pub use run::{RunId, RunOutcome, RunSummary};
pub use window::{
    format_elapsed, frames_per_window, max_window_count, samples_per_window, DEFAULT_WINDOW_SECS,
};
