//! Error classification, recovery policies, retries, and checkpoints
//!
//! - [`classifier`] maps a failure to an [`ErrorKind`](crate::domain::ErrorKind)
//! - [`policy`] maps a kind to a [`RecoveryPolicy`]
//! - [`retry`] executes a step under that policy
//! - [`checkpoint`] keeps the rollback ledger for imports

pub mod checkpoint;
pub mod classifier;
pub mod policy;
pub mod retry;

pub use checkpoint::{Checkpoint, CheckpointLedger, Compensation, PriorRecords, WrittenState};
pub use classifier::{classify, classify_message};
pub use policy::{RecoveryAction, RecoveryPolicies, RecoveryPolicy};
pub use retry::{RecoveryFailure, RetryExecutor};
