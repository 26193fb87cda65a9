//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "shopvault.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing shopvault configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(()) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Point [store] data_dir at your shop data directory");
                println!("  2. Validate configuration: shopvault validate-config");
                println!("  3. Export: shopvault export --data-type products");
                println!("  4. Import: shopvault import <file> --dry-run");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# shopvault configuration

[application]
log_level = "info"
dry_run = false

[store]
data_dir = "./data"

[export]
output_dir = "./exports"
default_data_type = "complete"

[import]
verify_checksum = true

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with every option and comments
    fn generate_config_with_examples() -> String {
        r#"# shopvault configuration
#
# Every option is shown with its default value. Values may reference
# environment variables as ${VAR_NAME}, and any key can be overridden with
# SHOPVAULT_<SECTION>_<KEY> (for example SHOPVAULT_EXPORT_OUTPUT_DIR).

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run: validate and plan imports without writing to the store
dry_run = false

# ============================================================================
# Shop Store
# ============================================================================
[store]
# Directory holding one <dataKey>.json array per entity kind
# (products.json, saleItems.json, ...)
data_dir = "./data"

# ============================================================================
# Export
# ============================================================================
[export]
# Where snapshot files are written
output_dir = "./exports"

# Data type exported when --data-type is not given:
# products | sales | customers | expenses | stock_movements | bulk_pricing | complete
default_data_type = "complete"

# Cooperative pause between batches, in milliseconds
batch_pause_ms = 0

# Snapshot format version written into new files
snapshot_version = "2.0"

# ============================================================================
# Import
# ============================================================================
[import]
# Recompute and compare the snapshot checksum before importing
verify_checksum = true

# ============================================================================
# Adaptive Batching
# ============================================================================
[batching]
min_batch_size = 5
max_batch_size = 100

# Estimated memory utilization (0, 1] above which batches are halved
memory_threshold = 0.8
avg_bytes_per_record = 2048
memory_budget_bytes = 67108864

# Number of batch durations remembered
history_size = 20

# ============================================================================
# Recovery
# ============================================================================
[recovery]
# Retries for retryable failures (0-10); attempt n waits retry_delay_ms * n
max_retries = 3
retry_delay_ms = 1000

# Checkpoints kept for rollback
checkpoint_capacity = 10

# ============================================================================
# Sanitizer
# ============================================================================
[sanitizer]
# lenient: unparseable numbers become 0 and are reported
# strict: records with unparseable numbers are rejected
numeric_policy = "lenient"

# ============================================================================
# Verification
# ============================================================================
[verification]
# Checksum written into new snapshots (rolling32 or sha256)
checksum_algorithm = "rolling32"

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to console output
local_enabled = true
local_path = "./logs"

# Rotation (daily, hourly or never)
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tempfile::TempDir;

    #[test]
    fn test_generated_configs_load() {
        let minimal = load_config_from_str(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(minimal.store.data_dir, "./data");

        let full = load_config_from_str(&InitArgs::generate_config_with_examples()).unwrap();
        assert_eq!(full.batching.max_batch_size, 100);
        assert_eq!(full.verification.checksum_algorithm, "rolling32");
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("shopvault.toml");
        fs::write(&output, "# existing").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_CONFIG);
        assert_eq!(fs::read_to_string(&output).unwrap(), "# existing");
    }

    #[tokio::test]
    async fn test_init_writes_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("shopvault.toml");
        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: true,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_OK);
        assert!(fs::read_to_string(&output).unwrap().contains("[batching]"));
    }
}
