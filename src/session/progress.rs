//! Progress handler trait for acquisition driven by `initialize`

use crate::model::DownloadState;

/// Receives acquisition events while the manager drives a download to
/// completion on the caller's behalf
pub trait ProgressHandler: Send + Sync {
    /// Called for every event, terminal ones included.
    fn on_progress(&self, event: &DownloadState);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &DownloadState) {
        // Intentionally empty
    }
}
