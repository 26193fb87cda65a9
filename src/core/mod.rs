//! Core business logic for shopvault.
//!
//! # Modules
//!
//! - [`sanitize`] - Per-record structural checks and defensive cleanup
//! - [`integrity`] - Checksums, record-count manifests, identifier checks
//! - [`batch`] - Adaptive batch sizing
//! - [`recovery`] - Error classification, recovery policies, retries, checkpoints
//! - [`snapshot`] - Export and import orchestration
//!
//! # Export Workflow
//!
//! 1. **Fetch**: Read every kind the data type needs from the store
//! 2. **Filter**: Narrow to exactly the kinds the data type allows
//! 3. **Sanitize**: Drop unusable records and fields, coerce numeric columns
//! 4. **Build integrity**: Record counts, rule manifest, relationships
//! 5. **Write**: Seal the envelope with its checksum and write the file
//!
//! Import reads and verifies the file, sanitizes again, checks join keys, and
//! writes to the store in checkpointed batches.
//!
//! # Example
//!
//! ```rust,no_run
//! use shopvault::adapters::files::LocalFileSystem;
//! use shopvault::adapters::store::JsonDirStore;
//! use shopvault::config::load_config;
//! use shopvault::core::snapshot::{EngineSettings, SnapshotEngine};
//! use shopvault::domain::DataTypeSelector;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("shopvault.toml")?;
//! let settings = EngineSettings::from_config(&config)?;
//!
//! let mut engine = SnapshotEngine::new(
//!     Arc::new(JsonDirStore::new(&config.store.data_dir)),
//!     Arc::new(LocalFileSystem::new()),
//!     settings,
//! );
//!
//! let outcome = engine.export(DataTypeSelector::Complete).await?;
//! println!("Records: {}", outcome.summary.total_records);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod integrity;
pub mod recovery;
pub mod sanitize;
pub mod snapshot;
