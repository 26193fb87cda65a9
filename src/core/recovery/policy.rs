//! Recovery policy table
//!
//! Every [`ErrorKind`] maps to exactly one [`RecoveryPolicy`].

use crate::config::RecoveryConfig;
use crate::domain::errors::ErrorKind;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// What the pipeline does about a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Re-attempt the same step with linear backoff
    Retry,
    /// Drop the offending record or section and continue
    Skip,
    /// Restore the active checkpoint; terminal for the operation
    Rollback,
    /// Abort with an actionable message
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryAction::Retry => "retry",
            RecoveryAction::Skip => "skip",
            RecoveryAction::Rollback => "rollback",
            RecoveryAction::UserIntervention => "user_intervention",
        };
        f.write_str(name)
    }
}

/// Recovery policy for one error kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Primary action
    pub action: RecoveryAction,
    /// Retry budget (zero unless the action is retry)
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * n`
    pub retry_delay: Duration,
    /// Action once retries are exhausted
    pub on_exhausted: RecoveryAction,
    /// Whether the mitigation callback runs before each retry
    pub mitigate: bool,
    /// Operator-facing explanation
    pub user_message: &'static str,
    /// What the operator can do about it
    pub hint: &'static str,
}

impl RecoveryPolicy {
    fn terminal(action: RecoveryAction, user_message: &'static str, hint: &'static str) -> Self {
        Self {
            action,
            max_retries: 0,
            retry_delay: Duration::ZERO,
            on_exhausted: action,
            mitigate: false,
            user_message,
            hint,
        }
    }

    /// Delay before retry attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Policy table built from the recovery configuration
#[derive(Debug, Clone)]
pub struct RecoveryPolicies {
    max_retries: u32,
    retry_delay: Duration,
}

impl RecoveryPolicies {
    /// Creates the table from configuration
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Policy for `kind`
    pub fn policy_for(&self, kind: ErrorKind) -> RecoveryPolicy {
        use RecoveryAction::*;

        match kind {
            ErrorKind::FileNotFound => RecoveryPolicy::terminal(
                UserIntervention,
                "The selected file could not be found. Check the path and try again.",
                "Check that the path points to an existing snapshot file",
            ),
            ErrorKind::InvalidFileFormat => RecoveryPolicy::terminal(
                UserIntervention,
                "The file is not a valid snapshot. Select a JSON file produced by an export.",
                "Select a JSON snapshot produced by shopvault export",
            ),
            ErrorKind::FileCorrupted => RecoveryPolicy::terminal(
                UserIntervention,
                "The snapshot failed its integrity check. Re-export the data and try again.",
                "Re-export the data and import the new file",
            ),
            ErrorKind::InvalidDataStructure => RecoveryPolicy::terminal(
                UserIntervention,
                "The snapshot structure is invalid. Re-export the data with a current version.",
                "Re-export the data with the current version",
            ),
            ErrorKind::DataTypeMismatch => RecoveryPolicy::terminal(
                UserIntervention,
                "The snapshot holds a different data type than the one selected.",
                "Select the data type recorded in the snapshot",
            ),
            ErrorKind::EmptyDataType => RecoveryPolicy::terminal(
                UserIntervention,
                "The selected data type has no records in this snapshot.",
                "Export data of this type first, or select a different data type",
            ),
            ErrorKind::MissingDataType => RecoveryPolicy::terminal(
                UserIntervention,
                "The selected data type is not present in this snapshot.",
                "Select a data type the snapshot contains",
            ),
            ErrorKind::StorageSpaceInsufficient => RecoveryPolicy::terminal(
                UserIntervention,
                "Not enough storage space. Free up space and try again.",
                "Free up storage space and run the operation again",
            ),
            ErrorKind::Unknown => RecoveryPolicy::terminal(
                UserIntervention,
                "An unexpected error occurred. The operation was stopped.",
                "Check the log for details and run the operation again",
            ),
            ErrorKind::MissingRequiredFields => RecoveryPolicy::terminal(
                Skip,
                "Records missing required fields were skipped.",
                "Fill in the missing fields in the source data and export again",
            ),
            ErrorKind::CorruptedDataSection => RecoveryPolicy::terminal(
                Skip,
                "Unreadable data sections were skipped.",
                "Repair or remove the unreadable data file and export again",
            ),
            ErrorKind::MalformedRecords => RecoveryPolicy::terminal(
                Skip,
                "Malformed records were skipped.",
                "Fix the malformed records in the source data and export again",
            ),
            ErrorKind::CircularReference => RecoveryPolicy::terminal(
                Skip,
                "Records with circular references were skipped.",
                "Remove the self-referencing fields from the source data",
            ),
            ErrorKind::InvalidNumericData => RecoveryPolicy::terminal(
                Skip,
                "Records with invalid numeric values were skipped.",
                "Correct the non-numeric prices, costs and quantities",
            ),
            ErrorKind::ReferenceIntegrityError => RecoveryPolicy::terminal(
                Rollback,
                "Records reference data that does not exist. Changes were rolled back.",
                "Fix the identifiers in the source data and export again",
            ),
            ErrorKind::ConstraintViolation => RecoveryPolicy {
                action: Retry,
                max_retries: self.max_retries,
                retry_delay: self.retry_delay,
                on_exhausted: Rollback,
                mitigate: false,
                user_message: "The store rejected the data. Changes were rolled back.",
                hint: "Remove conflicting records from the store, then import again",
            },
            ErrorKind::TransactionFailed => RecoveryPolicy {
                action: Retry,
                max_retries: self.max_retries,
                retry_delay: self.retry_delay,
                on_exhausted: Rollback,
                mitigate: false,
                user_message: "The store transaction failed. Changes were rolled back.",
                hint: "Make sure no other process is using the store, then import again",
            },
            ErrorKind::NetworkError => RecoveryPolicy {
                action: Retry,
                max_retries: self.max_retries,
                retry_delay: self.retry_delay.saturating_mul(2),
                on_exhausted: UserIntervention,
                mitigate: false,
                user_message: "A network error occurred. Check connectivity and try again.",
                hint: "Check connectivity, then run the operation again",
            },
            ErrorKind::MemoryLimitExceeded => RecoveryPolicy {
                action: Retry,
                max_retries: 2,
                retry_delay: self.retry_delay.saturating_mul(2),
                on_exhausted: UserIntervention,
                mitigate: true,
                user_message: "The device ran low on memory. Close other apps or export a smaller data type.",
                hint: "Lower [batching] max_batch_size or export a smaller data type",
            },
        }
    }
}

impl Default for RecoveryPolicies {
    fn default() -> Self {
        Self::new(&RecoveryConfig::default())
    }
}
