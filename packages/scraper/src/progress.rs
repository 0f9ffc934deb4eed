//! Progress over the outer targets of a run.
//!
//! A run reports how many outer targets it will walk (exam sessions,
//! discipline codes, or the single course listing) and ticks once per
//! finished target. The terminal bar lives in the CLI utilities crate;
//! library code and tests use [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from the scrapes.
///
/// Shared as `Arc<dyn ProgressCallback>` through the scrape context.
pub trait ProgressCallback: Send + Sync {
    /// Number of outer targets the current scrape will walk.
    fn set_total(&self, total: u64);

    /// `delta` more targets are done.
    fn inc(&self, delta: u64);

    /// Names the target being walked, e.g. `"exams Fall 2015"`.
    fn set_message(&self, msg: String);

    /// The run is over; `msg` summarises it.
    fn finish(&self, msg: String);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`], for callers that want no progress output.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
