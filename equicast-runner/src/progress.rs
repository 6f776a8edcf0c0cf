//! Progress reporting for retry sweeps.
//!
//! The executor calls these hooks from worker threads, so implementations
//! must be `Send + Sync`.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Observer for a retry sweep.
pub trait SweepProgress: Send + Sync {
    /// Called before an attempt dispatches `total` items across `workers` threads.
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32, workers: usize, total: usize);

    /// Called from a worker thread as each item finishes.
    fn on_item_complete(&self, item: &str, success: bool);

    /// Called once the attempt's pool has drained.
    fn on_attempt_complete(&self, attempt: u32, succeeded: usize, failed: usize);
}

/// Reports nothing. Used by tests and non-interactive runs.
pub struct SilentProgress;

impl SweepProgress for SilentProgress {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32, _workers: usize, _total: usize) {}
    fn on_item_complete(&self, _item: &str, _success: bool) {}
    fn on_attempt_complete(&self, _attempt: u32, _succeeded: usize, _failed: usize) {}
}

/// Terminal progress bar, one bar per attempt.
pub struct BarProgress {
    label: String,
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl SweepProgress for BarProgress {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32, workers: usize, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style());
        bar.set_message(format!(
            "{} attempt {attempt}/{max_attempts} ({workers} workers)",
            self.label
        ));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_item_complete(&self, _item: &str, _success: bool) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.inc(1);
            }
        }
    }

    fn on_attempt_complete(&self, _attempt: u32, _succeeded: usize, _failed: usize) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_progress_survives_a_full_attempt() {
        let progress = BarProgress::new("fx prices");
        progress.on_attempt_start(1, 5, 4, 3);
        for item in ["EUR/USD", "GBP/USD", "USD/JPY"] {
            progress.on_item_complete(item, true);
        }
        progress.on_attempt_complete(1, 3, 0);
        assert!(progress.bar.lock().unwrap().is_none());
    }
}
