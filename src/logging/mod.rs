//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with structured fields
//! - Configurable log levels (`RUST_LOG` wins over the configured level)
//! - JSON file logging with daily or hourly rotation
//!
//! # Example
//!
//! ```no_run
//! use shopvault::logging::init_logging;
//! use shopvault::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! tracing::error!(error = "Something went wrong", "Error occurred");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of an export operation
///
/// # Example
///
/// ```no_run
/// use shopvault::log_export_start;
/// use shopvault::domain::DataTypeSelector;
///
/// log_export_start!(DataTypeSelector::Products);
/// ```
#[macro_export]
macro_rules! log_export_start {
    ($data_type:expr) => {
        tracing::info!(data_type = %$data_type, "Starting export");
    };
}

/// Log the completion of an export operation
///
/// # Example
///
/// ```no_run
/// use shopvault::log_export_complete;
/// use std::time::Duration;
///
/// let count = 42;
/// let duration = Duration::from_secs(10);
/// log_export_complete!(count, duration);
/// ```
#[macro_export]
macro_rules! log_export_complete {
    ($count:expr, $duration:expr) => {
        tracing::info!(
            count = $count,
            duration_ms = $duration.as_millis() as u64,
            "Snapshot written"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use shopvault::log_error_with_context;
/// use shopvault::domain::VaultError;
///
/// let error = VaultError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = %$context,
            "Error occurred"
        );
    };
}

/// Log a batch processing step
///
/// # Example
///
/// ```no_run
/// use shopvault::log_batch_processing;
///
/// log_batch_processing!(100, 1000);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($current:expr, $total:expr) => {
        tracing::debug!(
            current = $current,
            total = $total,
            progress_pct = ($current as f64 / $total as f64 * 100.0),
            "Processed batch"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use shopvault::log_retry_attempt;
/// use shopvault::domain::ErrorKind;
///
/// log_retry_attempt!(2, 3, "write sales batch 1", ErrorKind::TransactionFailed, "database is locked");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $operation:expr, $kind:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            operation = %$operation,
            kind = %$kind,
            reason = %$reason,
            "Retrying operation"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{DataTypeSelector, ErrorKind, VaultError};
    use std::time::Duration;

    #[test]
    fn test_macros_expand() {
        let error = VaultError::Store("database is locked".to_string());
        log_export_start!(DataTypeSelector::Sales);
        log_export_complete!(3usize, Duration::from_millis(20));
        log_error_with_context!(&error, "writing batch");
        log_batch_processing!(10usize, 40usize);
        log_retry_attempt!(1u32, 3u32, "write", ErrorKind::TransactionFailed, &error);
    }
}
