//! Progress bar for apply runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use secgroups::{Phase, ProgressCallback, StepResult};

/// Shows one bar per apply phase. `ProgressBar` is internally synchronized,
/// so worker threads report steps directly.
pub struct ApplyProgress {
    bar: ProgressBar,
}

impl ApplyProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = ProgressBar::hidden();
        if !quiet {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        bar.set_style(bar_style());
        Self { bar }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {prefix:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

impl ProgressCallback for ApplyProgress {
    fn on_phase_start(&self, phase: Phase, count: usize) {
        self.bar.reset();
        self.bar.set_length(count as u64);
        self.bar.set_prefix(phase.label());
    }

    fn on_step_complete(&self, entity: &str, result: &StepResult) {
        let symbol = match result {
            StepResult::Created { .. } | StepResult::Authorized => "✓",
            StepResult::AlreadyPresent => "○",
            StepResult::Failed { .. } => "✗",
        };
        if let StepResult::Failed { error } = result {
            log::warn!("{entity}: {error}");
        }
        self.bar.set_message(format!("{symbol} {entity}"));
        self.bar.inc(1);
    }

    fn on_phase_complete(&self, _phase: Phase) {
        self.bar.finish_and_clear();
    }
}
