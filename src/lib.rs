// shopvault - Snapshot export and import for point-of-sale shop data
// Copyright (c) 2025 Shopvault Contributors
// Licensed under the MIT License

//! # shopvault - POS snapshot export/import
//!
//! shopvault serializes a shop's operational data (products, categories,
//! suppliers, sales, sale items, customers, expenses, stock movements,
//! bulk-pricing tiers) into versioned, checksummed snapshot files, and imports
//! them back with validation, retries, and checkpointed rollback.
//!
//! ## Architecture
//!
//! shopvault follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (sanitize, integrity, batch, recovery, snapshot)
//! - [`adapters`] - External collaborators (shop store, file surface)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shopvault::adapters::files::LocalFileSystem;
//! use shopvault::adapters::store::JsonDirStore;
//! use shopvault::core::snapshot::{EngineSettings, SnapshotEngine};
//! use shopvault::domain::DataTypeSelector;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = SnapshotEngine::new(
//!         Arc::new(JsonDirStore::new("./data")),
//!         Arc::new(LocalFileSystem::new()),
//!         EngineSettings::default(),
//!     );
//!
//!     let outcome = engine.export(DataTypeSelector::Products).await?;
//!     println!("Exported {} records", outcome.summary.total_records);
//!
//!     let summary = engine
//!         .import(Path::new(&outcome.summary.path), DataTypeSelector::Products)
//!         .await?;
//!     println!("Imported {} records", summary.written_records());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Pipeline failures carry an explicit [`domain::ErrorKind`] and an
//! actionable message naming what was selected, what was found, and what to
//! do next:
//!
//! ```rust,no_run
//! use shopvault::domain::{PipelineError, VaultError};
//!
//! fn report(err: &VaultError) {
//!     eprintln!("{}", err.user_message());
//! }
//! ```
//!
//! ## Logging
//!
//! shopvault uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! tracing::info!(data_type = "products", "Starting export");
//! tracing::warn!(kind = "product", index = 3, "Rejected record");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
