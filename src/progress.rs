//! Progress-callback trait for run, step and batch events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe a
//! run as it moves through its stages, or a batch as it moves through files.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docextract::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StepCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for StepCounter {
//!     fn on_step_complete(&self, file_id: &str, stage: Stage, _output: &std::path::Path) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{file_id}: {stage} done ({n} so far)");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(StepCounter { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::workflow::{Stage, Workflow};
use std::path::Path;
use std::sync::Arc;

/// Called by the runners as they process stages and files.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive strictly in order from one task.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first stage of a run.
    fn on_run_start(&self, file_id: &str, workflow: Workflow, total_stages: usize) {
        let _ = (file_id, workflow, total_stages);
    }

    /// Called just before a stage's model request is sent.
    fn on_step_start(&self, file_id: &str, stage: Stage) {
        let _ = (file_id, stage);
    }

    /// Called after a stage's output has been persisted.
    fn on_step_complete(&self, file_id: &str, stage: Stage, output_path: &Path) {
        let _ = (file_id, stage, output_path);
    }

    /// Called after the final JSONL file has been written.
    fn on_run_complete(&self, file_id: &str, record_count: usize) {
        let _ = (file_id, record_count);
    }

    /// Called once before a directory batch starts.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when one file of a batch completes successfully.
    fn on_file_complete(&self, file_id: &str, index: usize, total_files: usize) {
        let _ = (file_id, index, total_files);
    }

    /// Called when one file of a batch fails; the batch continues.
    fn on_file_error(&self, file_id: &str, index: usize, total_files: usize, error: &str) {
        let _ = (file_id, index, total_files, error);
    }

    /// Called once after every file of a batch has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
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
    use crate::workflow::Step;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        step_starts: AtomicUsize,
        step_completes: AtomicUsize,
        file_errors: AtomicUsize,
        batch_success: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_step_start(&self, _file_id: &str, _stage: Stage) {
            self.step_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_step_complete(&self, _file_id: &str, _stage: Stage, _output_path: &Path) {
            self.step_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _file_id: &str, _index: usize, _total: usize, _error: &str) {
            self.file_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total_files: usize, success_count: usize) {
            self.batch_success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("a", Workflow::MultiStep, 4);
        cb.on_step_start("a", Stage::MultiStep(Step::Zero));
        cb.on_step_complete("a", Stage::MultiStep(Step::Zero), Path::new("out_step_0.txt"));
        cb.on_run_complete("a", 12);
        cb.on_batch_start(3);
        cb.on_file_error("b", 2, 3, "quota");
        cb.on_batch_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        for step in Step::ALL {
            tracker.on_step_start("a", Stage::MultiStep(step));
            tracker.on_step_complete("a", Stage::MultiStep(step), Path::new("x"));
        }
        tracker.on_file_error("b", 2, 2, "model invocation failed");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.step_starts.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.step_completes.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.file_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.batch_success.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_file_complete("a", 1, 10);
    }
}
