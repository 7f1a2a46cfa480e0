//! Per-item progress reporting.
//!
//! The harvester, the download engine and the extractor report one tick per
//! finished unit of work through [`Progress`]. The binary plugs in indicatif
//! bars; library callers and tests use [`NoProgress`] or their own counter.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Sink for per-item progress ticks.
pub trait Progress: Send + Sync {
    /// Sets the number of items once it is known.
    fn set_total(&self, _total: usize) {}

    /// Records one finished item.
    fn advance(&self);

    /// Signals that no more items will be reported.
    fn finish(&self) {}
}

/// Progress sink that discards every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&self) {}
}

impl Progress for ProgressBar {
    fn set_total(&self, total: usize) {
        self.set_length(total as u64);
    }

    fn advance(&self) {
        self.inc(1);
    }

    fn finish(&self) {
        ProgressBar::finish(self);
    }
}

const BAR_TEMPLATE: &str = "{msg:>12} [{bar:40}] {pos}/{len} ({elapsed})";

/// Creates a progress bar for `len` items labelled with `message`.
///
/// When `visible` is false the bar draws nowhere but still counts.
#[must_use]
pub fn progress_bar(len: usize, message: &'static str, visible: bool) -> Arc<ProgressBar> {
    let target = if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let bar = ProgressBar::with_draw_target(Some(len as u64), target);
    bar.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(message);
    Arc::new(bar)
}
