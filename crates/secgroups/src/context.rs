//! Progress reporting hooks
//!
//! The executor calls these from worker threads, so implementations take
//! `&self` and must be `Sync`.

use crate::types::{Phase, StepResult};

/// Progress callback for apply runs
pub trait ProgressCallback: Sync {
    /// Called when a phase starts with the number of steps it will run
    fn on_phase_start(&self, phase: Phase, count: usize);

    /// Called after each create or authorize step
    fn on_step_complete(&self, entity: &str, result: &StepResult);

    /// Called when a phase completes
    fn on_phase_complete(&self, phase: Phase);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&self, _phase: Phase, _count: usize) {}
    fn on_step_complete(&self, _entity: &str, _result: &StepResult) {}
    fn on_phase_complete(&self, _phase: Phase) {}
}

/// Progress callback that logs every step
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_phase_start(&self, phase: Phase, count: usize) {
        log::info!("{} ({count})", phase.label());
    }

    fn on_step_complete(&self, entity: &str, result: &StepResult) {
        match result {
            StepResult::Created { id } => log::info!("{entity}: created {id}"),
            StepResult::Authorized => log::info!("{entity}: authorized"),
            StepResult::AlreadyPresent => log::debug!("{entity}: already present"),
            StepResult::Failed { error } => log::warn!("{entity}: {error}"),
        }
    }

    fn on_phase_complete(&self, _phase: Phase) {}
}
