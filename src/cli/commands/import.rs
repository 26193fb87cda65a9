//! Import command implementation
//!
//! This module implements the `import` command, which verifies a snapshot
//! file and writes its records into the shop store in checkpointed batches.

use super::{
    build_engine, report_failure, EXIT_CONFIG, EXIT_OK, EXIT_ROLLED_BACK, EXIT_WARNINGS,
};
use crate::config::load_config;
use crate::domain::DataTypeSelector;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot file to import
    pub path: PathBuf,

    /// Data type to import; defaults to the data type recorded in the file
    #[arg(short, long)]
    pub data_type: Option<String>,

    /// Validate and plan batches without writing to the store
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(path = %self.path.display(), "Starting import command");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Configuration could not be loaded");
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        let requested = match self.data_type.as_deref().map(str::parse::<DataTypeSelector>) {
            Some(Ok(selector)) => Some(selector),
            Some(Err(e)) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
            None => None,
        };

        let mut engine = match build_engine(&config, shutdown_signal) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let selector = match requested {
            Some(selector) => selector,
            None => match engine.verify(&self.path).await {
                Ok(report) => report.data_type,
                Err(e) => return Ok(report_failure("Reading the snapshot failed", &e)),
            },
        };

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No data will be written to the store");
            println!();
        }
        println!("📥 Importing {selector} from {}", self.path.display());

        let summary = match engine.import(&self.path, selector).await {
            Ok(summary) => summary,
            Err(e) => return Ok(report_failure(&format!("Import of {selector} failed"), &e)),
        };

        if let Some(rollback) = &summary.rollback {
            println!("↩️  Import rolled back to checkpoint {}", rollback.checkpoint_id);
            println!("   {}", rollback.message);
            println!("   Records removed: {}", rollback.removed_records);
            println!("   Records restored: {}", rollback.restored_records);
            return Ok(EXIT_ROLLED_BACK);
        }

        if summary.dry_run {
            println!("✅ Dry run complete: {} records would be written", summary.total_records);
        } else {
            println!("✅ Imported {} records", summary.written_records());
        }
        for (key, count) in &summary.written {
            println!("     {key}: {count}");
        }
        if summary.rejected_records > 0 || summary.skipped_records > 0 {
            println!("   ⚠️  {}", summary.skip_message());
        }
        for warning in &summary.warnings {
            println!("   ⚠️  {warning}");
        }

        if summary.has_warnings() {
            Ok(EXIT_WARNINGS)
        } else {
            Ok(EXIT_OK)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::EXIT_USER_INTERVENTION;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> PathBuf {
        let config_path = dir.path().join("shopvault.toml");
        fs::write(
            &config_path,
            format!(
                "[store]\ndata_dir = {:?}\n\n[logging]\nlocal_enabled = false\n",
                dir.path().join("data").to_string_lossy()
            ),
        )
        .unwrap();
        config_path
    }

    #[tokio::test]
    async fn test_import_of_missing_file_needs_user_intervention() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        let args = ImportArgs {
            path: dir.path().join("missing.json"),
            data_type: Some("products".to_string()),
            dry_run: false,
        };
        let (_tx, rx) = watch::channel(false);
        let code = args
            .execute(config_path.to_str().unwrap(), rx)
            .await
            .unwrap();
        assert_eq!(code, EXIT_USER_INTERVENTION);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_data_type() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir);
        let args = ImportArgs {
            path: dir.path().join("snapshot.json"),
            data_type: Some("invoices".to_string()),
            dry_run: true,
        };
        let (_tx, rx) = watch::channel(false);
        let code = args
            .execute(config_path.to_str().unwrap(), rx)
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
