//! Progress-callback trait for per-file extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the input files.
//!
//! The library itself only logs through `tracing`; the CLI uses this trait
//! to drive its progress bar and print one line per file.
//!
//! # Example
//!
//! ```rust
//! use slugsaver::{ExtractionConfig, ExtractionProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     records: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, _index: usize, _total: usize, path: &Path, records: usize) {
//!         self.records.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("{} → {records} deals", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { records: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it processes each input file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Files are processed one at a time, so events for
/// different files never interleave.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after glob expansion, before any file is touched.
    ///
    /// # Arguments
    /// * `total_files` — number of expanded input paths
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when an input is rejected during selection.
    ///
    /// # Arguments
    /// * `path`   — the rejected path
    /// * `reason` — human-readable reason
    fn on_file_skipped(&self, path: &Path, reason: &str) {
        let _ = (path, reason);
    }

    /// Called just before a flyer is encoded and sent to the model.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position among the expanded inputs
    /// * `total` — number of expanded inputs
    /// * `path`  — the flyer being processed
    fn on_file_start(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a flyer was extracted and normalised.
    ///
    /// # Arguments
    /// * `records` — records produced by the normaliser (before filtering)
    fn on_file_complete(&self, index: usize, total: usize, path: &Path, records: usize) {
        let _ = (index, total, path, records);
    }

    /// Called when a flyer failed; its records are discarded.
    ///
    /// # Arguments
    /// * `error` — human-readable error description
    fn on_file_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        let _ = (index, total, path, error);
    }

    /// Called once after every input has been attempted.
    ///
    /// # Arguments
    /// * `extracted` — files that produced records
    /// * `failed`    — files that were attempted and failed
    /// * `skipped`   — files rejected during selection
    fn on_run_complete(&self, extracted: usize, failed: usize, skipped: usize) {
        let _ = (extracted, failed, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        skips: AtomicUsize,
        records: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_file_skipped(&self, _path: &Path, _reason: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_start(&self, _index: usize, _total: usize, _path: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _path: &Path, records: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.records.fetch_add(records, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _total: usize, _path: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_file_skipped(Path::new("notes.txt"), "not a .pdf file");
        cb.on_file_start(2, 3, Path::new("a.pdf"));
        cb.on_file_complete(2, 3, Path::new("a.pdf"), 12);
        cb.on_file_error(3, 3, Path::new("b.pdf"), "timeout");
        cb.on_run_complete(1, 1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_file_skipped(Path::new("missing.pdf"), "does not exist");
        tracker.on_file_start(2, 3, Path::new("week1.pdf"));
        tracker.on_file_complete(2, 3, Path::new("week1.pdf"), 40);
        tracker.on_file_start(3, 3, Path::new("week2.pdf"));
        tracker.on_file_error(3, 3, Path::new("week2.pdf"), "HTTP 401");

        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.records.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(1);
        cb.on_file_start(1, 1, Path::new("flyer.pdf"));
    }
}
