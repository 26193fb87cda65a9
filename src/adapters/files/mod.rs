//! File surface used to write, read, and share snapshot files

pub mod local;

pub use local::LocalFileSystem;

use crate::domain::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File operations consumed by the snapshot engine
///
/// All operations are fallible and safe to retry.
#[async_trait]
pub trait FileSurface: Send + Sync {
    /// Writes `bytes` to `path`; the file is visible only once complete
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Reads the whole file
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Whether `path` exists
    async fn file_exists(&self, path: &Path) -> Result<bool>;

    /// Hands a finished file to the platform's share facility
    async fn share(&self, path: &Path, title: &str) -> Result<PathBuf>;
}
