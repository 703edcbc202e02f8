//! Mux progress as reported by `-progress pipe:2`.

use serde::{Deserialize, Serialize};

/// Latest values of one `-progress` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Set by the final `progress=end` block
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output position in seconds.
    pub fn out_secs(&self) -> f64 {
        self.out_time_ms.max(0) as f64 / 1000.0
    }

    /// Percent of an output expected to last `total_secs`, capped at 100.
    pub fn percent_of(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if !(total_secs > 0.0) {
            return 0.0;
        }
        (self.out_secs() / total_secs * 100.0).min(100.0)
    }
}
