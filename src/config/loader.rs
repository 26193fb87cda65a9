//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::VaultConfig;
use crate::domain::errors::VaultError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into VaultConfig
/// 4. Applies environment variable overrides (SHOPVAULT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use shopvault::config::loader::load_config;
///
/// let config = load_config("shopvault.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<VaultConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(VaultError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        VaultError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Parses configuration text, applying substitution, overrides, and validation
pub fn load_config_from_str(contents: &str) -> Result<VaultConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: VaultConfig = toml::from_str(&contents)
        .map_err(|e| VaultError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        VaultError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| VaultError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(VaultError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using SHOPVAULT_* prefix
///
/// Environment variables follow the pattern: SHOPVAULT_<SECTION>_<KEY>,
/// for example SHOPVAULT_EXPORT_OUTPUT_DIR or SHOPVAULT_BATCHING_MAX_BATCH_SIZE.
/// Values that fail to parse are ignored.
fn apply_env_overrides(config: &mut VaultConfig) {
    fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|v| v.parse().ok())
    }

    // Application overrides
    if let Ok(val) = std::env::var("SHOPVAULT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = parsed("SHOPVAULT_APPLICATION_DRY_RUN") {
        config.application.dry_run = val;
    }

    // Store overrides
    if let Ok(val) = std::env::var("SHOPVAULT_STORE_DATA_DIR") {
        config.store.data_dir = val;
    }

    // Export overrides
    if let Ok(val) = std::env::var("SHOPVAULT_EXPORT_OUTPUT_DIR") {
        config.export.output_dir = val;
    }
    if let Ok(val) = std::env::var("SHOPVAULT_EXPORT_DEFAULT_DATA_TYPE") {
        config.export.default_data_type = val;
    }
    if let Some(val) = parsed("SHOPVAULT_EXPORT_BATCH_PAUSE_MS") {
        config.export.batch_pause_ms = val;
    }

    // Import overrides
    if let Some(val) = parsed("SHOPVAULT_IMPORT_VERIFY_CHECKSUM") {
        config.import.verify_checksum = val;
    }

    // Batching overrides
    if let Some(val) = parsed("SHOPVAULT_BATCHING_MIN_BATCH_SIZE") {
        config.batching.min_batch_size = val;
    }
    if let Some(val) = parsed("SHOPVAULT_BATCHING_MAX_BATCH_SIZE") {
        config.batching.max_batch_size = val;
    }
    if let Some(val) = parsed("SHOPVAULT_BATCHING_MEMORY_THRESHOLD") {
        config.batching.memory_threshold = val;
    }
    if let Some(val) = parsed("SHOPVAULT_BATCHING_MEMORY_BUDGET_BYTES") {
        config.batching.memory_budget_bytes = val;
    }

    // Recovery overrides
    if let Some(val) = parsed("SHOPVAULT_RECOVERY_MAX_RETRIES") {
        config.recovery.max_retries = val;
    }
    if let Some(val) = parsed("SHOPVAULT_RECOVERY_RETRY_DELAY_MS") {
        config.recovery.retry_delay_ms = val;
    }

    // Sanitizer and verification overrides
    if let Ok(val) = std::env::var("SHOPVAULT_SANITIZER_NUMERIC_POLICY") {
        config.sanitizer.numeric_policy = val;
    }
    if let Ok(val) = std::env::var("SHOPVAULT_VERIFICATION_CHECKSUM_ALGORITHM") {
        config.verification.checksum_algorithm = val;
    }

    // Logging overrides
    if let Some(val) = parsed("SHOPVAULT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val;
    }
    if let Ok(val) = std::env::var("SHOPVAULT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
