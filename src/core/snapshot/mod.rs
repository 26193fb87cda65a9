//! Snapshot engine: export and import of shop data
//!
//! The engine pulls entities from a [`Store`](crate::adapters::store::Store),
//! routes them through the sanitizer and integrity builder, and writes a
//! checksummed [`SnapshotEnvelope`] through a
//! [`FileSurface`](crate::adapters::files::FileSurface). Import reverses the
//! flow, writing to the store in checkpointed batches.
//!
//! # Example
//!
//! ```no_run
//! use shopvault::adapters::files::LocalFileSystem;
//! use shopvault::adapters::store::InMemoryStore;
//! use shopvault::core::snapshot::{EngineSettings, SnapshotEngine};
//! use shopvault::domain::DataTypeSelector;
//! use std::sync::Arc;
//!
//! # async fn example() -> shopvault::domain::Result<()> {
//! let mut engine = SnapshotEngine::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(LocalFileSystem::new()),
//!     EngineSettings::default(),
//! );
//! let outcome = engine.export(DataTypeSelector::Products).await?;
//! println!("wrote {}", outcome.summary.path.display());
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod envelope;
pub mod exporter;
pub mod importer;
pub mod progress;
pub mod summary;
pub mod verify;

pub use engine::{EngineSettings, SnapshotEngine};
pub use envelope::{
    export_file_name, recompute_checksum, RelationshipMap, SnapshotEnvelope, SnapshotMetadata,
    SNAPSHOT_VERSION, SUPPORTED_VERSIONS,
};
pub use importer::IMPORT_ORDER;
pub use progress::{Operation, PipelineStage, Progress, ProgressCallback, ProgressTracker};
pub use summary::{ExportOutcome, ExportSummary, ImportSummary, RollbackInfo};
pub use verify::{parse_snapshot, satisfiable_selectors, VerificationReport};
