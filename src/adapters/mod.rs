//! External collaborators of the snapshot pipeline.
//!
//! - [`store`] - the shop database, read per kind and written in checkpointed batches
//! - [`files`] - the file surface snapshots are written to, read from, and shared
//!
//! # Design Pattern
//!
//! Adapters isolate external systems behind traits so the engine can be driven
//! by the JSON-directory store and local file system in the CLI, and by the
//! in-memory store in tests.
//!
//! ```rust,no_run
//! use shopvault::adapters::files::LocalFileSystem;
//! use shopvault::adapters::store::JsonDirStore;
//!
//! let store = JsonDirStore::new("./data");
//! let files = LocalFileSystem::new();
//! ```

pub mod files;
pub mod store;
