//! Progress reporting for regeneration runs.
//!
//! The engine emits a [`ProgressSnapshot`] before the first batch, after every
//! batch and once more at termination. Reporters are invoked synchronously on
//! the engine's control path and must not panic.
//!
//! Closures work as reporters directly:
//!
//! ```
//! use retag_core::progress::ProgressReporter;
//! use retag_core::ProgressSnapshot;
//!
//! let print = |snapshot: &ProgressSnapshot| {
//!     println!("{}/{} {}", snapshot.processed, snapshot.total, snapshot.status);
//! };
//! print.report(&ProgressSnapshot::default());
//! ```

use tracing::info;

use crate::models::{ProgressSnapshot, RunStatus};

/// Sink for progress snapshots.
pub trait ProgressReporter: Send + Sync {
    /// Called with each snapshot. The default implementation does nothing.
    fn report(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn report(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Reporter that ignores all snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Reporter that logs snapshots through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, snapshot: &ProgressSnapshot) {
        let label = snapshot.current_label.as_deref().unwrap_or("-");
        match snapshot.status {
            RunStatus::Idle => {}
            RunStatus::Running if snapshot.processed == 0 => {
                info!(total = snapshot.total, "Regeneration started");
            }
            RunStatus::Running => {
                info!(
                    processed = snapshot.processed,
                    total = snapshot.total,
                    successful = snapshot.successful,
                    failed = snapshot.failed,
                    last = label,
                    "Batch complete"
                );
            }
            RunStatus::Completed => {
                info!(
                    total = snapshot.total,
                    successful = snapshot.successful,
                    failed = snapshot.failed,
                    "Regeneration completed"
                );
            }
            RunStatus::Cancelled => {
                info!(
                    processed = snapshot.processed,
                    total = snapshot.total,
                    successful = snapshot.successful,
                    failed = snapshot.failed,
                    "Regeneration cancelled"
                );
            }
        }
    }
}
