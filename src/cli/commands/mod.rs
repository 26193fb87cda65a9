//! CLI command implementations
//!
//! Commands return process exit codes:
//!
//! | code | meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | completed with warnings |
//! | 2 | configuration error |
//! | 3 | user intervention required, or cancelled |
//! | 4 | import rolled back |
//! | 5 | fatal error |

pub mod export;
pub mod import;
pub mod init;
pub mod validate;
pub mod verify;

use crate::adapters::files::LocalFileSystem;
use crate::adapters::store::JsonDirStore;
use crate::config::VaultConfig;
use crate::core::recovery::{RecoveryAction, RecoveryPolicies};
use crate::core::snapshot::{EngineSettings, Progress, SnapshotEngine};
use crate::domain::{Result, VaultError};
use std::sync::Arc;
use tokio::sync::watch;

pub const EXIT_OK: i32 = 0;
pub const EXIT_WARNINGS: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_USER_INTERVENTION: i32 = 3;
pub const EXIT_ROLLED_BACK: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Maps a failed operation to its exit code
///
/// Typed failures follow the recovery table: a kind whose policy ends in
/// user intervention exits 3, one that ends in rollback exits 4.
pub fn exit_code_for(error: &VaultError) -> i32 {
    match error {
        VaultError::Configuration(_) => EXIT_CONFIG,
        VaultError::Cancelled { .. } => EXIT_USER_INTERVENTION,
        other => match other.typed_kind() {
            Some(kind) => match RecoveryPolicies::default().policy_for(kind).on_exhausted {
                RecoveryAction::UserIntervention => EXIT_USER_INTERVENTION,
                RecoveryAction::Rollback => EXIT_ROLLED_BACK,
                RecoveryAction::Retry | RecoveryAction::Skip => EXIT_FATAL,
            },
            None => EXIT_FATAL,
        },
    }
}

/// Builds an engine over the JSON-directory store named in `config`
pub(crate) fn build_engine(
    config: &VaultConfig,
    shutdown_signal: watch::Receiver<bool>,
) -> Result<SnapshotEngine> {
    let settings = EngineSettings::from_config(config)?;
    let mut engine = SnapshotEngine::new(
        Arc::new(JsonDirStore::new(&config.store.data_dir)),
        Arc::new(LocalFileSystem::new()),
        settings,
    )
    .with_cancellation(shutdown_signal);

    engine.set_progress_callback(Box::new(|progress: &Progress| {
        tracing::debug!(
            stage = %progress.stage,
            current = progress.current,
            total = progress.total,
            percentage = progress.percentage,
            "Progress"
        );
    }));

    Ok(engine)
}

/// Prints a failed operation and returns its exit code
pub(crate) fn report_failure(context: &str, error: &VaultError) -> i32 {
    crate::log_error_with_context!(error, context);
    println!("❌ {context}");
    println!("   {}", error.user_message());
    exit_code_for(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, PipelineError};
    use test_case::test_case;

    fn pipeline(kind: ErrorKind) -> VaultError {
        PipelineError::new(kind, "failed").into()
    }

    #[test_case(ErrorKind::FileNotFound => EXIT_USER_INTERVENTION; "missing file")]
    #[test_case(ErrorKind::MissingDataType => EXIT_USER_INTERVENTION; "missing data type")]
    #[test_case(ErrorKind::Unknown => EXIT_USER_INTERVENTION; "unknown")]
    #[test_case(ErrorKind::ReferenceIntegrityError => EXIT_ROLLED_BACK; "reference integrity")]
    #[test_case(ErrorKind::TransactionFailed => EXIT_ROLLED_BACK; "exhausted transaction retries")]
    #[test_case(ErrorKind::MalformedRecords => EXIT_FATAL; "skip kind surfacing as error")]
    fn test_exit_code_for_kind(kind: ErrorKind) -> i32 {
        exit_code_for(&pipeline(kind))
    }

    #[test]
    fn test_exit_code_for_untyped_errors() {
        assert_eq!(
            exit_code_for(&VaultError::Configuration("bad".to_string())),
            EXIT_CONFIG
        );
        assert_eq!(
            exit_code_for(&VaultError::Cancelled {
                stage: "fetching".to_string()
            }),
            EXIT_USER_INTERVENTION
        );
        assert_eq!(exit_code_for(&VaultError::Other("boom".to_string())), EXIT_FATAL);
    }
}
