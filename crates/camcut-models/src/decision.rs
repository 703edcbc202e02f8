//! Selection decisions and per-window progress records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// The recorded choice of winning source for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SelectionDecision {
    /// Zero-based window index
    pub window_index: u32,
    /// Stable index of the winning source
    pub source_index: usize,
    /// Score of the winner's leading frame
    pub score: i64,
}

impl SelectionDecision {
    pub fn new(window_index: u32, source_index: usize, score: i64) -> Self {
        Self {
            window_index,
            source_index,
            score,
        }
    }

    /// Output time at which this window starts.
    pub fn start_secs(&self, window_secs: f64) -> f64 {
        self.window_index as f64 * window_secs
    }
}

/// Progress record emitted once per evaluated window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressRecord {
    /// Run the record belongs to
    pub run_id: RunId,
    /// Zero-based window index
    pub window_index: u32,
    /// Output time at the start of the window, in seconds
    pub elapsed_secs: f64,
    /// Winning source index
    pub source_index: usize,
    /// Winning score
    pub score: i64,
}

impl ProgressRecord {
    pub fn from_decision(run_id: &RunId, decision: &SelectionDecision, window_secs: f64) -> Self {
        Self {
            run_id: run_id.clone(),
            window_index: decision.window_index,
            elapsed_secs: decision.start_secs(window_secs),
            source_index: decision.source_index,
            score: decision.score,
        }
    }
}
