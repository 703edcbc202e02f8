//! Per-window progress records for an observer outside the engine.

use camcut_models::ProgressRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Non-blocking sender of progress records.
///
/// Records are dropped, never awaited, when the observer falls behind.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressRecord>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded progress channel.
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressRecord>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ProgressSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

impl ProgressSender {
    pub fn emit(&self, record: ProgressRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(window = record.window_index, "Progress channel full, record dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Records that could not be delivered.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
