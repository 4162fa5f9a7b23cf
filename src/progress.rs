//! Progress bar for batch runs.

use indicatif::{ProgressBar, ProgressStyle};
use uploader_core::manifest::LinkEntry;
use uploader_core::pipeline::{ItemOutcome, RunObserver};
use uploader_core::report::RunCounts;

/// Renders run progress with an indicatif bar.
pub(crate) struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    /// Creates the observer; a hidden bar draws nothing.
    pub(crate) fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl RunObserver for ProgressObserver {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_item_start(&self, position: usize, entry: &LinkEntry) {
        self.bar
            .set_message(format!("[{position}] Uploading {}...", entry.name));
    }

    fn on_item_finish(&self, _position: usize, outcome: &ItemOutcome) {
        if let ItemOutcome::Failed { reason, .. } = outcome {
            self.bar.println(format!("failed: {reason}"));
        }
        self.bar.inc(1);
    }

    fn on_finish(&self, _counts: RunCounts) {
        self.bar.finish_and_clear();
    }
}
