//! Snapshot engine
//!
//! The engine owns its collaborators and settings. Export and import take
//! `&mut self`, so one engine runs at most one operation at a time and the
//! store it holds is never shared between two running pipelines.

use super::progress::{Operation, ProgressCallback, ProgressTracker};
use super::verify::{parse_snapshot, VerificationReport};
use crate::adapters::files::FileSurface;
use crate::adapters::store::Store;
use crate::config::{BatchingConfig, RecoveryConfig, VaultConfig};
use crate::core::integrity::ChecksumAlgorithm;
use crate::core::recovery::{RecoveryPolicies, RetryExecutor};
use crate::core::sanitize::{NumericPolicy, Sanitizer};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::errors::VaultError;
use crate::domain::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Settings the engine runs with, derived from [`VaultConfig`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Version written into envelopes
    pub snapshot_version: String,
    /// Producing application version
    pub app_version: String,
    /// Directory export files are written to
    pub output_dir: PathBuf,
    /// Pause after each batch, on top of the cooperative yield
    pub batch_pause: Duration,
    /// Recompute checksums on import
    pub verify_checksum: bool,
    /// Validate and plan imports without writing
    pub dry_run: bool,
    pub numeric_policy: NumericPolicy,
    pub checksum_algorithm: ChecksumAlgorithm,
    pub batching: BatchingConfig,
    pub recovery: RecoveryConfig,
}

impl EngineSettings {
    /// Derives settings from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the policy or algorithm names are unknown.
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        Ok(Self {
            snapshot_version: config.export.snapshot_version.clone(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            output_dir: PathBuf::from(&config.export.output_dir),
            batch_pause: Duration::from_millis(config.export.batch_pause_ms),
            verify_checksum: config.import.verify_checksum,
            dry_run: config.application.dry_run,
            numeric_policy: config.sanitizer.numeric_policy.parse()?,
            checksum_algorithm: config.verification.checksum_algorithm.parse()?,
            batching: config.batching.clone(),
            recovery: config.recovery.clone(),
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = VaultConfig::default();
        Self {
            snapshot_version: config.export.snapshot_version,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            output_dir: PathBuf::from(config.export.output_dir),
            batch_pause: Duration::ZERO,
            verify_checksum: config.import.verify_checksum,
            dry_run: false,
            numeric_policy: NumericPolicy::default(),
            checksum_algorithm: ChecksumAlgorithm::default(),
            batching: config.batching,
            recovery: config.recovery,
        }
    }
}

/// Export/import orchestrator
pub struct SnapshotEngine {
    pub(super) store: Arc<dyn Store>,
    pub(super) files: Arc<dyn FileSurface>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) settings: EngineSettings,
    cancel: Option<watch::Receiver<bool>>,
    progress: Option<ProgressCallback>,
}

impl SnapshotEngine {
    /// Creates an engine using the system clock
    pub fn new(store: Arc<dyn Store>, files: Arc<dyn FileSurface>, settings: EngineSettings) -> Self {
        Self {
            store,
            files,
            clock: Arc::new(SystemClock),
            settings,
            cancel: None,
            progress: None,
        }
    }

    /// Replaces the clock export timestamps are taken from
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stops export and import between batches once `signal` turns `true`
    pub fn with_cancellation(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Sets the single progress subscriber, replacing any previous one
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// Settings in effect
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Reads and checks a snapshot without importing it
    pub async fn verify(&self, path: &Path) -> Result<VerificationReport> {
        let bytes = self.files.read_file(path).await?;
        let (raw, envelope) = parse_snapshot(&bytes, path)?;
        let report = VerificationReport::from_snapshot(path, &raw, &envelope)?;
        tracing::info!(
            path = %path.display(),
            checksum_valid = report.checksum_valid(),
            count_mismatches = report.count_mismatches.len(),
            identifier_violations = report.identifier_violations.len(),
            "Verified snapshot"
        );
        Ok(report)
    }

    /// Hands a written snapshot to the file surface's share facility
    pub async fn share(&self, path: &Path, title: &str) -> Result<PathBuf> {
        self.files.share(path, title).await
    }

    pub(super) fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(self.settings.numeric_policy)
    }

    pub(super) fn executor(&self) -> RetryExecutor {
        RetryExecutor::new(RecoveryPolicies::new(&self.settings.recovery))
    }

    /// Takes the subscriber for the duration of one operation
    pub(super) fn start_tracking(&mut self, operation: Operation) -> ProgressTracker {
        ProgressTracker::new(operation, self.progress.take())
    }

    pub(super) fn stop_tracking(&mut self, tracker: ProgressTracker) {
        self.progress = tracker.into_callback();
    }

    /// Fails with [`VaultError::Cancelled`] if cancellation was requested
    pub(super) fn check_cancelled(&self, stage: &str) -> Result<()> {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|signal| *signal.borrow());
        if cancelled {
            tracing::warn!(stage, "Cancellation requested, stopping between batches");
            return Err(VaultError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }

    /// Cooperative pause between batches
    pub(super) async fn pause(&self) {
        tokio::task::yield_now().await;
        if !self.settings.batch_pause.is_zero() {
            tokio::time::sleep(self.settings.batch_pause).await;
        }
    }
}

impl std::fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("settings", &self.settings)
            .field("cancellable", &self.cancel.is_some())
            .field("has_progress_callback", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let mut config = VaultConfig::default();
        config.sanitizer.numeric_policy = "strict".to_string();
        config.verification.checksum_algorithm = "sha256".to_string();
        config.export.batch_pause_ms = 5;

        let settings = EngineSettings::from_config(&config).unwrap();
        assert_eq!(settings.numeric_policy, NumericPolicy::Strict);
        assert_eq!(settings.checksum_algorithm, ChecksumAlgorithm::Sha256);
        assert_eq!(settings.batch_pause, Duration::from_millis(5));
        assert!(settings.verify_checksum);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let mut config = VaultConfig::default();
        config.sanitizer.numeric_policy = "loose".to_string();
        assert!(EngineSettings::from_config(&config).is_err());
    }
}
