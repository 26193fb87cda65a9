//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the shopvault configuration file.

use super::{EXIT_CONFIG, EXIT_OK};
use crate::config::load_config;
use crate::core::snapshot::EngineSettings;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading already validates; a failure here is either unreadable or invalid
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Err(e) = EngineSettings::from_config(&config) {
            println!("❌ Configuration is invalid");
            println!("   Error: {e}");
            return Ok(EXIT_CONFIG);
        }

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Data Directory: {}", config.store.data_dir);
        println!("  Output Directory: {}", config.export.output_dir);
        println!("  Default Data Type: {}", config.export.default_data_type);
        println!("  Snapshot Version: {}", config.export.snapshot_version);
        println!(
            "  Batch Size: {}-{}",
            config.batching.min_batch_size, config.batching.max_batch_size
        );
        println!(
            "  Retries: {} (base delay {} ms)",
            config.recovery.max_retries, config.recovery.retry_delay_ms
        );
        println!("  Numeric Policy: {}", config.sanitizer.numeric_policy);
        println!(
            "  Checksum Algorithm: {}",
            config.verification.checksum_algorithm
        );
        println!();
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_validate_accepts_minimal_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shopvault.toml");
        fs::write(&path, "[application]\nlog_level = \"debug\"\n").unwrap();

        let code = ValidateArgs {}.execute(path.to_str().unwrap()).await.unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[tokio::test]
    async fn test_validate_rejects_inverted_batch_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shopvault.toml");
        fs::write(
            &path,
            "[batching]\nmin_batch_size = 50\nmax_batch_size = 10\n",
        )
        .unwrap();

        let code = ValidateArgs {}.execute(path.to_str().unwrap()).await.unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
