//! Verify command implementation
//!
//! Reads a snapshot and reports checksum, count agreement, and identifier
//! problems without touching the store.

use super::{report_failure, EXIT_OK, EXIT_USER_INTERVENTION, EXIT_WARNINGS};
use crate::adapters::files::LocalFileSystem;
use crate::adapters::store::InMemoryStore;
use crate::core::snapshot::{EngineSettings, SnapshotEngine};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Snapshot file to check
    pub path: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl VerifyArgs {
    /// Execute the verify command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(path = %self.path.display(), "Verifying snapshot");

        // Verification never reads the store
        let engine = SnapshotEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(LocalFileSystem::new()),
            EngineSettings::default(),
        );

        let report = match engine.verify(&self.path).await {
            Ok(report) => report,
            Err(e) => return Ok(report_failure("Verification failed", &e)),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", report.format_summary());
        }

        if !report.is_valid() {
            Ok(EXIT_USER_INTERVENTION)
        } else if !report.dangling_references.is_empty() {
            Ok(EXIT_WARNINGS)
        } else {
            Ok(EXIT_OK)
        }
    }
}
