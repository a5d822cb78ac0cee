//! Progress reporting for the per-area fetch loops.
//!
//! The merge pipeline reports through [`ProgressCallback`] so that the CLI
//! can render `indicatif` bars while tests and library callers stay silent
//! with [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a long-running loop.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of steps the loop will take.
    fn set_total(&self, total: u64);

    /// Advances by `delta` steps.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator (usually the area
    /// being fetched).
    fn set_message(&self, msg: String);

    /// Marks the loop as done.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
