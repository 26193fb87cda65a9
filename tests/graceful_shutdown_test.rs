//! Integration tests for cancellation
//!
//! The engine checks a `watch` flag between batches. A cancelled export
//! writes no file; a cancelled import keeps the batches that finished.

use serde_json::json;
use shopvault::adapters::files::LocalFileSystem;
use shopvault::adapters::store::InMemoryStore;
use shopvault::cli::commands::{exit_code_for, EXIT_USER_INTERVENTION};
use shopvault::core::snapshot::{EngineSettings, PipelineStage, Progress, SnapshotEngine};
use shopvault::domain::{DataTypeSelector, EntityKind, VaultError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use uuid::Uuid;

fn settings(dir: &TempDir) -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.output_dir = dir.path().join("exports");
    settings.batching.min_batch_size = 5;
    settings.batching.max_batch_size = 5;
    settings
}

fn customers(store: &InMemoryStore, count: usize) {
    for n in 0..count {
        store
            .push(
                EntityKind::Customer,
                json!({"id": Uuid::new_v4().to_string(), "name": format!("Customer {n}")}),
            )
            .unwrap();
    }
}

#[tokio::test]
async fn test_shutdown_signal_default_is_false() {
    let (_tx, rx) = watch::channel(false);
    assert!(!*rx.borrow());
}

#[tokio::test]
async fn test_cancelled_import_keeps_finished_batches() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(InMemoryStore::new());
    customers(&source, 20);
    let mut exporter = SnapshotEngine::new(source, Arc::new(LocalFileSystem::new()), settings(&dir));
    let path = exporter
        .export(DataTypeSelector::Customers)
        .await
        .unwrap()
        .summary
        .path;

    // Cancel as soon as the second batch has been written
    let (tx, rx) = watch::channel(false);
    let target = Arc::new(InMemoryStore::new());
    let mut importer = SnapshotEngine::new(
        target.clone(),
        Arc::new(LocalFileSystem::new()),
        settings(&dir),
    )
    .with_cancellation(rx);
    importer.set_progress_callback(Box::new(move |progress: &Progress| {
        if progress.stage == PipelineStage::Importing && progress.current >= 10 {
            let _ = tx.send(true);
        }
    }));

    let err = importer
        .import(&path, DataTypeSelector::Customers)
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::Cancelled { ref stage } if stage == "importing"));
    assert_eq!(exit_code_for(&err), EXIT_USER_INTERVENTION);
    assert_eq!(target.count(EntityKind::Customer), 10);
}

#[tokio::test]
async fn test_cancellation_from_another_task() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    customers(&store, 50);

    let mut settings = settings(&dir);
    settings.batch_pause = Duration::from_millis(20);

    let (tx, rx) = watch::channel(false);
    let mut engine = SnapshotEngine::new(store, Arc::new(LocalFileSystem::new()), settings)
        .with_cancellation(rx);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = tx.send(true);
    });

    let result = engine.export(DataTypeSelector::Customers).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(VaultError::Cancelled { .. })));
    assert!(!dir.path().join("exports").exists());
}
