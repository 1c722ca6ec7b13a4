//! Progress reporting and cooperative cancellation.
//!
//! Every pipeline stage runs against a shared [`Feedback`] object. The
//! cancellation contract is polling-based: pipelines check `is_canceled`
//! between delegated stages, and an in-flight operation is never interrupted,
//! only the next stage is skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared progress and cancellation channel for a pipeline run.
///
/// Info and warning messages are routed through `tracing` so the library
/// stays independent of any host UI.
#[derive(Debug, Default)]
pub struct Feedback {
    canceled: AtomicBool,
    progress_bits: AtomicU64,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The running pipeline stops at the next stage
    /// boundary.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Set overall progress as a percentage, clamped to 0-100.
    pub fn set_progress(&self, percent: f64) {
        let clamped = percent.clamp(0.0, 100.0);
        self.progress_bits.store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress_bits.load(Ordering::Relaxed))
    }

    pub fn push_info(&self, message: &str) {
        tracing::info!(target: "mzgis", "{message}");
    }

    pub fn push_warning(&self, message: &str) {
        tracing::warn!(target: "mzgis", "{message}");
    }
}

/// View of a parent [`Feedback`] divided into a fixed number of steps.
///
/// `set_current_step` maps the step index onto the parent progress range.
#[derive(Debug)]
pub struct MultiStepFeedback<'a> {
    steps: usize,
    parent: &'a Feedback,
}

impl<'a> MultiStepFeedback<'a> {
    pub fn new(steps: usize, parent: &'a Feedback) -> Self {
        Self {
            steps: steps.max(1),
            parent,
        }
    }

    pub fn set_current_step(&self, step: usize) {
        let fraction = step.min(self.steps) as f64 / self.steps as f64;
        self.parent.set_progress(fraction * 100.0);
    }
}

impl std::ops::Deref for MultiStepFeedback<'_> {
    type Target = Feedback;

    fn deref(&self) -> &Feedback {
        self.parent
    }
}

/// Result of a pipeline run under cooperative cancellation.
///
/// A canceled run is a legitimate outcome, not an error: the pipeline stops
/// issuing stages and reports no outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Canceled,
}

impl<T> Outcome<T> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }

    /// Returns the outputs of a completed run, `None` if canceled.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(v) => Some(v),
            Outcome::Canceled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag() {
        let fb = Feedback::new();
        assert!(!fb.is_canceled());
        fb.cancel();
        assert!(fb.is_canceled());
    }

    #[test]
    fn test_progress_clamped() {
        let fb = Feedback::new();
        fb.set_progress(150.0);
        assert_eq!(fb.progress(), 100.0);
        fb.set_progress(-3.0);
        assert_eq!(fb.progress(), 0.0);
    }

    #[test]
    fn test_multi_step_maps_to_parent() {
        let fb = Feedback::new();
        let multi = MultiStepFeedback::new(4, &fb);
        multi.set_current_step(1);
        assert_eq!(fb.progress(), 25.0);
        multi.set_current_step(4);
        assert_eq!(fb.progress(), 100.0);
        // Steps past the end saturate.
        multi.set_current_step(9);
        assert_eq!(fb.progress(), 100.0);
    }

    #[test]
    fn test_multi_step_derefs_to_parent() {
        let fb = Feedback::new();
        let multi = MultiStepFeedback::new(3, &fb);
        multi.cancel();
        assert!(fb.is_canceled());
    }

    #[test]
    fn test_outcome_accessors() {
        let done: Outcome<i32> = Outcome::Completed(7);
        assert!(!done.is_canceled());
        assert_eq!(done.completed(), Some(7));
        let canceled: Outcome<i32> = Outcome::Canceled;
        assert!(canceled.is_canceled());
        assert_eq!(canceled.completed(), None);
    }
}
