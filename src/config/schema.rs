//! Configuration schema types
//!
//! This module defines the configuration structure for shopvault.

use serde::{Deserialize, Serialize};

/// Main shopvault configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Shop database location
    #[serde(default)]
    pub store: StoreConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Import settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Adaptive batch sizing
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Retry and checkpoint settings
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Record sanitizing policy
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// Integrity verification configuration
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VaultConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.store.validate()?;
        self.export.validate()?;
        self.batching.validate()?;
        self.recovery.validate()?;
        self.sanitizer.validate()?;
        self.verification.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (validate and plan, never write to the store)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Shop database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one `<dataKey>.json` array per entity kind
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl StoreConfig {
    fn validate(&self) -> Result<(), String> {
        if self.data_dir.trim().is_empty() {
            return Err("store.data_dir cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory snapshot files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Data type exported when the CLI gets no `--data-type`
    #[serde(default = "default_data_type")]
    pub default_data_type: String,

    /// Cooperative pause between batches in milliseconds
    #[serde(default)]
    pub batch_pause_ms: u64,

    /// Snapshot format version written into envelopes
    #[serde(default = "default_snapshot_version")]
    pub snapshot_version: String,
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.output_dir.trim().is_empty() {
            return Err("export.output_dir cannot be empty".to_string());
        }

        let valid_types = crate::domain::DataTypeSelector::names();
        if !valid_types.contains(&self.default_data_type.as_str()) {
            return Err(format!(
                "Invalid export.default_data_type '{}'. Must be one of: {}",
                self.default_data_type,
                valid_types.join(", ")
            ));
        }

        if self.batch_pause_ms > 10_000 {
            return Err(format!(
                "export.batch_pause_ms must be <= 10000, got {}",
                self.batch_pause_ms
            ));
        }

        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_data_type: default_data_type(),
            batch_pause_ms: 0,
            snapshot_version: default_snapshot_version(),
        }
    }
}

/// Import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Recompute and compare the envelope checksum before importing
    #[serde(default = "default_true")]
    pub verify_checksum: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
        }
    }
}

/// Adaptive batch sizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Smallest batch ever planned
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    /// Largest batch ever planned
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Estimated memory utilization (0, 1] above which batches are halved
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    /// Assumed size of one record in memory
    #[serde(default = "default_avg_bytes_per_record")]
    pub avg_bytes_per_record: u64,

    /// Memory the pipeline may use before it is considered under pressure
    #[serde(default = "default_memory_budget_bytes")]
    pub memory_budget_bytes: u64,

    /// Number of batch durations remembered
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl BatchingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.min_batch_size == 0 {
            return Err("batching.min_batch_size must be > 0".to_string());
        }
        if self.min_batch_size > self.max_batch_size {
            return Err(format!(
                "batching.min_batch_size ({}) must be <= batching.max_batch_size ({})",
                self.min_batch_size, self.max_batch_size
            ));
        }
        if !(self.memory_threshold > 0.0 && self.memory_threshold <= 1.0) {
            return Err(format!(
                "batching.memory_threshold must be in (0, 1], got {}",
                self.memory_threshold
            ));
        }
        if self.avg_bytes_per_record == 0 {
            return Err("batching.avg_bytes_per_record must be > 0".to_string());
        }
        if self.memory_budget_bytes == 0 {
            return Err("batching.memory_budget_bytes must be > 0".to_string());
        }
        if self.history_size < 3 {
            return Err(format!(
                "batching.history_size must be >= 3, got {}",
                self.history_size
            ));
        }
        Ok(())
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
            memory_threshold: default_memory_threshold(),
            avg_bytes_per_record: default_avg_bytes_per_record(),
            memory_budget_bytes: default_memory_budget_bytes(),
            history_size: default_history_size(),
        }
    }
}

/// Retry and checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Maximum retry attempts for retryable error kinds
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry delay in milliseconds (linear backoff)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Number of checkpoints retained for rollback
    #[serde(default = "default_checkpoint_capacity")]
    pub checkpoint_capacity: usize,
}

impl RecoveryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries > 10 {
            return Err(format!(
                "recovery.max_retries must be <= 10, got {}",
                self.max_retries
            ));
        }
        if self.checkpoint_capacity == 0 {
            return Err("recovery.checkpoint_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            checkpoint_capacity: default_checkpoint_capacity(),
        }
    }
}

/// Record sanitizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// How unparseable numeric columns are handled (lenient or strict)
    #[serde(default = "default_numeric_policy")]
    pub numeric_policy: String,
}

impl SanitizerConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_policies = ["lenient", "strict"];
        if !valid_policies.contains(&self.numeric_policy.as_str()) {
            return Err(format!(
                "Invalid sanitizer.numeric_policy '{}'. Must be one of: {}",
                self.numeric_policy,
                valid_policies.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            numeric_policy: default_numeric_policy(),
        }
    }
}

/// Integrity verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Checksum algorithm written into new snapshots (rolling32 or sha256)
    #[serde(default = "default_checksum_algorithm")]
    pub checksum_algorithm: String,
}

impl VerificationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_algorithms = ["rolling32", "sha256"];
        if !valid_algorithms.contains(&self.checksum_algorithm.as_str()) {
            return Err(format!(
                "Invalid verification.checksum_algorithm '{}'. Must be one of: {}",
                self.checksum_algorithm,
                valid_algorithms.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            checksum_algorithm: default_checksum_algorithm(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_output_dir() -> String {
    "./exports".to_string()
}

fn default_data_type() -> String {
    "complete".to_string()
}

fn default_snapshot_version() -> String {
    crate::core::snapshot::SNAPSHOT_VERSION.to_string()
}

fn default_min_batch_size() -> usize {
    5
}

fn default_max_batch_size() -> usize {
    100
}

fn default_memory_threshold() -> f64 {
    0.8
}

fn default_avg_bytes_per_record() -> u64 {
    2048
}

fn default_memory_budget_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_history_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_checkpoint_capacity() -> usize {
    10
}

fn default_numeric_policy() -> String {
    "lenient".to_string()
}

fn default_checksum_algorithm() -> String {
    "rolling32".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = VaultConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batching.min_batch_size, 5);
        assert_eq!(config.batching.max_batch_size, 100);
        assert_eq!(config.recovery.checkpoint_capacity, 10);
        assert_eq!(config.sanitizer.numeric_policy, "lenient");
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig {
            log_level: "info".to_string(),
            dry_run: false,
        };

        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batching_config_validation() {
        let mut config = BatchingConfig::default();
        assert!(config.validate().is_ok());

        config.min_batch_size = 0;
        assert!(config.validate().is_err());

        config.min_batch_size = 200;
        assert!(config.validate().is_err());

        config.min_batch_size = 5;
        config.memory_threshold = 1.5;
        assert!(config.validate().is_err());

        config.memory_threshold = 0.0;
        assert!(config.validate().is_err());

        config.memory_threshold = 0.8;
        config.memory_budget_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recovery_config_validation() {
        let mut config = RecoveryConfig::default();
        assert!(config.validate().is_ok());

        config.max_retries = 11;
        assert!(config.validate().is_err());

        config.max_retries = 3;
        config.checkpoint_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_export_config_rejects_unknown_data_type() {
        let config = ExportConfig {
            default_data_type: "inventory".to_string(),
            ..ExportConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("stock_movements"));
    }

    #[test]
    fn test_sanitizer_and_verification_validation() {
        let sanitizer = SanitizerConfig {
            numeric_policy: "loose".to_string(),
        };
        assert!(sanitizer.validate().is_err());

        let verification = VerificationConfig {
            checksum_algorithm: "md5".to_string(),
        };
        assert!(verification.validate().is_err());
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
