//! Progress callbacks for pipeline hosts.

use crate::parse::BatchProgress;

use super::PipelineStep;

/// Status of one pipeline step indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step is running.
    Active,
    /// The step finished.
    Completed,
    /// The step failed.
    Failed,
}

/// Receives pipeline progress. Every method defaults to doing nothing.
pub trait PipelineObserver {
    /// A step changed status.
    fn step_changed(&mut self, step: PipelineStep, status: StepStatus) {
        let _ = (step, status);
    }

    /// A CSV chunk finished.
    fn batch_progress(&mut self, progress: &BatchProgress) {
        let _ = progress;
    }

    /// A degraded, non-fatal condition was detected.
    fn warning(&mut self, message: &str) {
        let _ = message;
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer that forwards progress to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl PipelineObserver for LoggingObserver {
    fn step_changed(&mut self, step: PipelineStep, status: StepStatus) {
        match status {
            StepStatus::Active => log::debug!("{step}: started"),
            StepStatus::Completed => log::info!("{step}: completed"),
            StepStatus::Failed => log::error!("{step}: failed"),
        }
    }

    fn batch_progress(&mut self, progress: &BatchProgress) {
        log::info!(
            "parsed chunk {}/{} ({}/{} lines, {}%)",
            progress.chunk_index + 1,
            progress.total_chunks,
            progress.total_processed,
            progress.total_lines,
            progress.percent_complete
        );
    }

    fn warning(&mut self, message: &str) {
        log::warn!("{message}");
    }
}
