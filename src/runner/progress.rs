//! Progress hook. The runner advances one unit per settled task; rendering is up to the sink.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

/// Receives progress signals from a run. Called under the run's lock, so implementations
/// should be quick.
pub trait Progress: Send + Sync {
    fn start(&self, total: u64, label: &str, unit: &str);

    fn advance(&self);

    fn finish(&self);
}

/// Discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _total: u64, _label: &str, _unit: &str) {}

    fn advance(&self) {}

    fn finish(&self) {}
}

/// Shared draw target for every bar, so log output can be printed around them.
pub fn bars() -> &'static MultiProgress {
    static BARS: OnceLock<MultiProgress> = OnceLock::new();
    BARS.get_or_init(MultiProgress::new)
}

/// Terminal progress bar on stderr.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

fn bar_style(unit: &str) -> ProgressStyle {
    let template = format!(
        "{{spinner}} {{msg}} [{{bar:40}}] {{pos}}/{{len}} {} ({{elapsed}})",
        unit
    );
    ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .progress_chars("█▉▊▋▌▍▎▏ ")
}

impl Progress for TerminalProgress {
    fn start(&self, total: u64, label: &str, unit: &str) {
        let bar = bars().add(ProgressBar::new(total));
        bar.set_style(bar_style(unit));
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        let mut slot = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn advance(&self) {
        if let Some(bar) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            bar.inc(1);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            bar.disable_steady_tick();
            bar.finish();
            bars().remove(&bar);
        }
    }
}

/// Spinner for loops whose length is unknown up front (paged listings).
pub fn page_spinner(label: &str, unit: &str) -> ProgressBar {
    let bar = bars().add(ProgressBar::new_spinner());
    let template = format!("{{spinner}} {{msg}} {{pos}} {} ({{elapsed}})", unit);
    bar.set_style(
        ProgressStyle::default_spinner()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_progress_counts_advances() {
        let progress = TerminalProgress::new();
        progress.start(3, "testing", "items");
        progress.advance();
        progress.advance();
        let pos = progress
            .bar
            .lock()
            .unwrap()
            .as_ref()
            .map(|b| b.position());
        assert_eq!(pos, Some(2));
        progress.finish();
        assert!(progress.bar.lock().unwrap().is_none());
    }

    #[test]
    fn advance_before_start_is_ignored() {
        let progress = TerminalProgress::new();
        progress.advance();
        progress.finish();
    }
}
