//! Retry executor
//!
//! Runs a fallible async step, classifying each failure and consulting the
//! policy table. Retryable kinds are re-attempted with linear backoff; every
//! other outcome is handed back to the caller with the action to take.

use super::classifier::classify;
use super::policy::{RecoveryAction, RecoveryPolicies, RecoveryPolicy};
use crate::domain::errors::{ErrorKind, PipelineError, VaultError};
use std::future::Future;
use thiserror::Error;

/// A step that could not be completed
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s) ({kind}, {action}): {error}")]
pub struct RecoveryFailure {
    /// Step name, for logs
    pub operation: String,
    /// Classified kind of the last error
    pub kind: ErrorKind,
    /// Action the caller must take now
    pub action: RecoveryAction,
    /// Policy that applied
    pub policy: RecoveryPolicy,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Last error
    #[source]
    pub error: VaultError,
}

impl RecoveryFailure {
    /// Actionable error for the caller
    ///
    /// Typed failures keep their own message; untyped ones are reported with
    /// the policy's message rather than the raw error text.
    pub fn into_pipeline_error(self) -> PipelineError {
        let found = format!("{} after {} attempt(s)", self.kind, self.attempts);
        match self.error {
            VaultError::Pipeline(mut error) => {
                if error.found.is_empty() {
                    error.found.push(found);
                }
                if error.hint.is_none() {
                    error.hint = Some(self.policy.hint.to_string());
                }
                error
            }
            other => {
                tracing::debug!(operation = %self.operation, error = %other, "Replacing raw error text");
                PipelineError::new(self.kind, self.policy.user_message)
                    .with_selected(self.operation)
                    .with_found([found])
                    .with_hint(self.policy.hint)
            }
        }
    }
}

/// Executes steps under the recovery policy table
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policies: RecoveryPolicies,
}

impl RetryExecutor {
    /// Creates an executor over a policy table
    pub fn new(policies: RecoveryPolicies) -> Self {
        Self { policies }
    }

    /// Policy table in use
    pub fn policies(&self) -> &RecoveryPolicies {
        &self.policies
    }

    /// Runs `step` until it succeeds or its failure is not retryable
    ///
    /// `step` receives the zero-based attempt number. `mitigate` runs before a
    /// retry whose policy asks for mitigation (memory exhaustion).
    pub async fn run<T, F, Fut, M>(
        &self,
        operation: &str,
        mut step: F,
        mut mitigate: M,
    ) -> Result<T, RecoveryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = crate::domain::Result<T>>,
        M: FnMut(ErrorKind),
    {
        let mut retries = 0u32;
        loop {
            let error = match step(retries).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let kind = classify(&error);
            let policy = self.policies.policy_for(kind);

            if policy.action == RecoveryAction::Retry && retries < policy.max_retries {
                retries += 1;
                crate::log_retry_attempt!(retries, policy.max_retries, operation, kind, &error);
                if policy.mitigate {
                    mitigate(kind);
                }
                tokio::time::sleep(policy.delay_for(retries)).await;
                continue;
            }

            let action = if policy.action == RecoveryAction::Retry {
                policy.on_exhausted
            } else {
                policy.action
            };
            tracing::warn!(
                operation,
                kind = %kind,
                action = %action,
                attempts = retries + 1,
                error = %error,
                "Step failed"
            );
            return Err(RecoveryFailure {
                operation: operation.to_string(),
                kind,
                action,
                policy,
                attempts: retries + 1,
                error,
            });
        }
    }
}
