//! Upload progress reporting.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Receives byte counts while a file is transferred.
pub trait ProgressSink: Send {
    fn on_progress(&mut self, file: &str, transferred: u64, total: u64);

    fn on_complete(&mut self, _file: &str) {}

    /// The transfer of `file` was abandoned; the next update starts a new file.
    fn on_error(&mut self, _file: &str) {}
}

/// Integer percentage of `transferred / total`, clamped to `[0, 100]`.
///
/// An empty file counts as complete.
pub fn percent(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = u128::from(transferred.min(total)) * 100 / u128::from(total);
    pct as u8
}

/// Drops updates that do not change the integer percentage.
#[derive(Debug, Default)]
pub struct PercentTracker {
    last: Option<u8>,
}

impl PercentTracker {
    /// The new percentage, or `None` when it equals the previous one.
    pub fn update(&mut self, transferred: u64, total: u64) -> Option<u8> {
        let pct = percent(transferred, total);
        if self.last == Some(pct) {
            return None;
        }
        self.last = Some(pct);
        Some(pct)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Terminal progress bar, one bar per file.
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
    style: ProgressStyle,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self { bar: None, style }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&mut self, file: &str, transferred: u64, total: u64) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new(total);
            bar.set_style(self.style.clone());
            bar.set_message(file.to_string());
            bar
        });
        bar.set_position(transferred.min(total));
    }

    fn on_complete(&mut self, file: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} uploaded", file));
        }
    }

    fn on_error(&mut self, file: &str) {
        if let Some(bar) = self.bar.take() {
            bar.abandon_with_message(format!("{} failed", file));
        }
    }
}

/// Logs each new integer percentage through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress {
    tracker: PercentTracker,
}

impl ProgressSink for LogProgress {
    fn on_progress(&mut self, file: &str, transferred: u64, total: u64) {
        if let Some(pct) = self.tracker.update(transferred, total) {
            debug!(file, transferred, total, "upload progress {}%", pct);
        }
    }

    fn on_complete(&mut self, file: &str) {
        self.tracker.reset();
        info!(file, "upload finished");
    }

    fn on_error(&mut self, _file: &str) {
        self.tracker.reset();
    }
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _file: &str, _transferred: u64, _total: u64) {}
}
