//! Export command implementation
//!
//! This module implements the `export` command, which writes a checksummed
//! snapshot of one data type from the shop store.

use super::{build_engine, report_failure, EXIT_CONFIG, EXIT_OK, EXIT_WARNINGS};
use crate::config::load_config;
use crate::domain::DataTypeSelector;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Data type to export (products, sales, customers, expenses,
    /// stock_movements, bulk_pricing, complete)
    #[arg(short, long)]
    pub data_type: Option<String>,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Hand the finished file to the share facility
    #[arg(long)]
    pub share: bool,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Configuration could not be loaded");
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Some(output_dir) = &self.output_dir {
            tracing::info!(output_dir = %output_dir, "Overriding output directory from CLI");
            config.export.output_dir = output_dir.clone();
        }

        let name = self
            .data_type
            .as_deref()
            .unwrap_or(&config.export.default_data_type);
        let selector: DataTypeSelector = match name.parse() {
            Ok(selector) => selector,
            Err(e) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let mut engine = match build_engine(&config, shutdown_signal) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("{e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("📦 Exporting {selector} from {}", config.store.data_dir);

        let outcome = match engine.export(selector).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(report_failure(&format!("Export of {selector} failed"), &e)),
        };
        let summary = &outcome.summary;

        println!("✅ Snapshot written: {}", summary.path.display());
        println!("   Records: {}", summary.total_records);
        for (key, count) in &summary.record_counts {
            println!("     {key}: {count}");
        }
        println!("   Checksum: {}", summary.checksum);
        if summary.empty_export {
            println!("   ⚠️  No records matched {selector}; the snapshot is empty");
        }
        if summary.rejected_records > 0 {
            println!("   ⚠️  Rejected records: {}", summary.rejected_records);
        }
        for warning in &summary.warnings {
            println!("   ⚠️  {warning}");
        }

        if self.share {
            let title = format!("{selector} export");
            match engine.share(&summary.path, &title).await {
                Ok(shared) => println!("📤 Shared: {}", shared.display()),
                Err(e) => return Ok(report_failure("Sharing the snapshot failed", &e)),
            }
        }

        if summary.has_warnings() {
            Ok(EXIT_WARNINGS)
        } else {
            Ok(EXIT_OK)
        }
    }
}
