//! Pipeline stage machine and progress reporting
//!
//! The stage machine is the single source of truth for where an operation
//! is. Every transition and every in-stage update is reported to at most one
//! subscriber as a [`Progress`] value.

use crate::domain::errors::VaultError;
use crate::domain::Result;
use serde::Serialize;
use std::fmt;

/// Stage of an export or import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Fetching,
    Filtering,
    Sanitizing,
    BuildingIntegrity,
    Writing,
    Reading,
    Validating,
    Importing,
    Done,
    Failed,
}

impl PipelineStage {
    /// Whether no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Filtering => "filtering",
            PipelineStage::Sanitizing => "sanitizing",
            PipelineStage::BuildingIntegrity => "building_integrity",
            PipelineStage::Writing => "writing",
            PipelineStage::Reading => "reading",
            PipelineStage::Validating => "validating",
            PipelineStage::Importing => "importing",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which stage sequence an operation follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Export,
    Import,
}

impl Operation {
    fn sequence(&self) -> &'static [PipelineStage] {
        use PipelineStage::*;
        match self {
            Operation::Export => &[
                Idle,
                Fetching,
                Filtering,
                Sanitizing,
                BuildingIntegrity,
                Writing,
                Done,
            ],
            Operation::Import => &[Idle, Reading, Validating, Sanitizing, Importing, Done],
        }
    }
}

/// Progress report delivered to the subscriber
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub stage: PipelineStage,
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Progress {
    /// Creates a report; an empty stage counts as complete
    pub fn new(stage: PipelineStage, current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            ((current.min(total) as f64 / total as f64) * 1000.0).round() / 10.0
        };
        Self {
            stage,
            current,
            total,
            percentage,
        }
    }
}

/// Single-subscriber progress callback
pub type ProgressCallback = Box<dyn FnMut(&Progress) + Send + Sync>;

/// Stage machine that reports every move to its subscriber
pub struct ProgressTracker {
    operation: Operation,
    stage: PipelineStage,
    total: usize,
    callback: Option<ProgressCallback>,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("operation", &self.operation)
            .field("stage", &self.stage)
            .field("total", &self.total)
            .finish()
    }
}

impl ProgressTracker {
    /// Starts a tracker in [`PipelineStage::Idle`]
    pub fn new(operation: Operation, callback: Option<ProgressCallback>) -> Self {
        Self {
            operation,
            stage: PipelineStage::Idle,
            total: 0,
            callback,
        }
    }

    /// Current stage
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Moves to the next stage of the sequence
    ///
    /// # Errors
    ///
    /// Returns an error if `stage` does not directly follow the current one.
    pub fn enter(&mut self, stage: PipelineStage, total: usize) -> Result<()> {
        let sequence = self.operation.sequence();
        let current = sequence.iter().position(|s| *s == self.stage);
        let next = current.and_then(|i| sequence.get(i + 1));
        if next != Some(&stage) {
            return Err(VaultError::Other(format!(
                "Invalid stage transition {} -> {}",
                self.stage, stage
            )));
        }

        tracing::debug!(from = %self.stage, to = %stage, total, "Stage transition");
        self.stage = stage;
        self.total = total;
        self.emit(0);
        Ok(())
    }

    /// Reports progress within the current stage
    pub fn update(&mut self, current: usize) {
        self.emit(current);
    }

    /// Completes the operation
    pub fn finish(&mut self) -> Result<()> {
        let total = self.total;
        self.enter(PipelineStage::Done, total)?;
        self.emit(total);
        Ok(())
    }

    /// Marks the operation failed; no-op once terminal
    pub fn fail(&mut self) {
        if self.stage.is_terminal() {
            return;
        }
        tracing::debug!(from = %self.stage, "Stage transition to failed");
        self.stage = PipelineStage::Failed;
        self.emit(0);
    }

    fn emit(&mut self, current: usize) {
        let progress = Progress::new(self.stage, current, self.total);
        if let Some(callback) = self.callback.as_mut() {
            callback(&progress);
        }
    }

    /// Returns the callback so the subscriber survives the operation
    pub fn into_callback(self) -> Option<ProgressCallback> {
        self.callback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Arc<Mutex<Vec<Progress>>>, ProgressCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Box::new(move |p: &Progress| {
            sink.lock().unwrap().push(p.clone());
        });
        (seen, callback)
    }

    #[test]
    fn test_export_sequence() {
        let (seen, callback) = recording();
        let mut tracker = ProgressTracker::new(Operation::Export, Some(callback));
        tracker.enter(PipelineStage::Fetching, 10).unwrap();
        tracker.update(5);
        tracker.enter(PipelineStage::Filtering, 10).unwrap();
        tracker.enter(PipelineStage::Sanitizing, 10).unwrap();
        tracker.enter(PipelineStage::BuildingIntegrity, 1).unwrap();
        tracker.enter(PipelineStage::Writing, 1).unwrap();
        tracker.finish().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1], Progress::new(PipelineStage::Fetching, 5, 10));
        assert_eq!(seen[1].percentage, 50.0);
        assert_eq!(seen.last().map(|p| p.stage), Some(PipelineStage::Done));
        assert_eq!(seen.last().map(|p| p.percentage), Some(100.0));
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut tracker = ProgressTracker::new(Operation::Export, None);
        tracker.enter(PipelineStage::Fetching, 1).unwrap();
        assert!(tracker.enter(PipelineStage::Writing, 1).is_err());
        assert!(ProgressTracker::new(Operation::Import, None)
            .enter(PipelineStage::Fetching, 1)
            .is_err());
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut tracker = ProgressTracker::new(Operation::Import, None);
        tracker.enter(PipelineStage::Reading, 1).unwrap();
        tracker.fail();
        assert_eq!(tracker.stage(), PipelineStage::Failed);
        assert!(tracker.enter(PipelineStage::Validating, 1).is_err());
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(Progress::new(PipelineStage::Importing, 1, 3).percentage, 33.3);
        assert_eq!(Progress::new(PipelineStage::Importing, 0, 0).percentage, 100.0);
    }
}
