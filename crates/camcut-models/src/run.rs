//! Run identity, outcome and summary.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::decision::SelectionDecision;

/// Unique identifier for one director run.
///
/// Every temporary artifact of a run embeds this id in its file name, so
/// several runs can share a temp directory without touching each other's files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the window loop of a run terminated.
///
/// Both variants are successful outcomes. A drained run simply produced less
/// output than requested because every source ran out of media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Elapsed output time reached the requested duration
    Completed,
    /// No source could supply a complete chunk before the target was reached
    Drained,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Drained => "drained",
        }
    }

    /// Whether the run stopped before reaching its target duration.
    pub fn is_early_stop(&self) -> bool {
        matches!(self, RunOutcome::Drained)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a finished run, suitable for a JSON report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: RunId,

    /// Terminal state of the window loop
    pub outcome: RunOutcome,

    /// Window length in seconds
    pub window_secs: f64,

    /// Requested output duration in seconds
    pub target_secs: f64,

    /// Output duration actually assembled (`decisions × window`)
    pub elapsed_secs: f64,

    /// Ordered decision log, one entry per evaluated window
    pub decisions: Vec<SelectionDecision>,

    /// Destination file, absent when the run produced no output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    /// Start timestamp
    pub started_at: DateTime<Utc>,

    /// Completion timestamp
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Number of windows won by each source, indexed by source index.
    pub fn wins_per_source(&self, source_count: usize) -> Vec<u32> {
        let mut wins = vec![0u32; source_count];
        for decision in &self.decisions {
            if let Some(slot) = wins.get_mut(decision.source_index) {
                *slot += 1;
            }
        }
        wins
    }

    /// Wall-clock processing time in seconds.
    pub fn processing_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
