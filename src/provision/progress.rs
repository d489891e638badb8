//! Progress reporting for running deployments.

use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;

/// Receives lifecycle signals keyed by deployment name.
pub trait ProgressTracker: Send + Sync {
    /// Called once before any deployment starts.
    fn start(&self);

    /// Called on every polling tick of `name`.
    fn refresh(&self, name: &str);

    /// Called when `name` reaches a terminal state.
    fn finish(&self, name: &str, succeeded: bool);

    /// Called once after every deployment has terminated.
    fn stop(&self);
}

/// Tracker that ignores every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressTracker for NoProgress {
    fn start(&self) {}
    fn refresh(&self, _name: &str) {}
    fn finish(&self, _name: &str, _succeeded: bool) {}
    fn stop(&self) {}
}

/// Terminal spinners, one per deployment, created on first refresh.
///
/// Each spinner ticks on its own at the polling interval so it keeps moving
/// between polls.
pub struct ProgressBars {
    multi: MultiProgress,
    bars: DashMap<String, ProgressBar>,
    style: ProgressStyle,
    tick: Duration,
}

impl fmt::Debug for ProgressBars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBars")
            .field("bars", &self.bars.len())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl ProgressBars {
    /// Creates a tracker drawing to stderr, ticking every `tick`.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self {
            multi: MultiProgress::new(),
            bars: DashMap::new(),
            style,
            tick,
        }
    }

    fn bar(&self, name: &str) -> ProgressBar {
        self.bars
            .entry(name.to_string())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(self.style.clone());
                bar.set_message(format!("{name}: waiting for remote"));
                bar.enable_steady_tick(self.tick);
                bar
            })
            .clone()
    }
}

impl ProgressTracker for ProgressBars {
    fn start(&self) {
        self.multi.set_move_cursor(true);
    }

    fn refresh(&self, name: &str) {
        self.bar(name).tick();
    }

    fn finish(&self, name: &str, succeeded: bool) {
        if let Some(bar) = self.bars.get(name) {
            let status = if succeeded { "done" } else { "failed" };
            bar.finish_with_message(format!("{name}: {status}"));
        }
    }

    fn stop(&self) {
        for bar in self.bars.iter() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }
}
