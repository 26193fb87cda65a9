//! Local file system implementation of [`FileSurface`]

use super::FileSurface;
use crate::domain::errors::{ErrorKind, PipelineError};
use crate::domain::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File surface over `tokio::fs`
///
/// Writes land in a `.partial` sibling first and are renamed into place, so
/// readers never observe a half-written snapshot.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Creates the file surface
    pub fn new() -> Self {
        Self
    }
}

/// Snapshot files next to a missing path, for the not-found message
async fn nearby_snapshots(path: &Path) -> Vec<String> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(_) => return vec![format!("directory {} does not exist", dir.display())],
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") {
            names.push(name);
        }
    }
    if names.is_empty() {
        return vec![format!("no snapshot files in {}", dir.display())];
    }
    names.sort();
    names.truncate(MAX_LISTED);
    names
}

const MAX_LISTED: usize = 10;

fn not_found(path: &Path, message: String, found: Vec<String>) -> PipelineError {
    PipelineError::new(ErrorKind::FileNotFound, message)
        .with_selected(path.display().to_string())
        .with_found(found)
        .with_hint("Check that the path points to an existing snapshot file")
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[async_trait]
impl FileSurface for LocalFileSystem {
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = partial_path(path);
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(
                path,
                format!("File not found: {}", path.display()),
                nearby_snapshots(path).await,
            )
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn share(&self, path: &Path, title: &str) -> Result<PathBuf> {
        if !self.file_exists(path).await? {
            return Err(not_found(
                path,
                format!("Cannot share missing file: {}", path.display()),
                nearby_snapshots(path).await,
            )
            .into());
        }
        tracing::info!(path = %path.display(), title, "Snapshot ready to share");
        Ok(path.to_path_buf())
    }
}
