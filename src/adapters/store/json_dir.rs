//! JSON-directory store
//!
//! Each kind lives in `<data_dir>/<dataKey>.json` as a JSON array. Missing
//! files read as empty. Writes go to a temporary file that is renamed over
//! the original, so a failed write leaves the previous contents in place.
//!
//! A kind file is parsed once and kept in memory; writes through the store
//! refresh the cached copy. The store must be the only writer of its
//! directory while it is in use.

use super::{upsert, Store};
use crate::domain::entity::EntityKind;
use crate::domain::errors::{ErrorKind, PipelineError};
use crate::domain::raw::RawValue;
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Store reading and writing one JSON array file per kind
#[derive(Debug)]
pub struct JsonDirStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
    cache: Mutex<BTreeMap<EntityKind, Arc<Vec<Value>>>>,
}

impl JsonDirStore {
    /// Creates a store rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Root directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File holding records of `kind`
    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.data_dir.join(format!("{}.json", kind.data_key()))
    }

    async fn load(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let path = self.path_for(kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(_) => Err(PipelineError::new(
                ErrorKind::CorruptedDataSection,
                format!("{} does not hold a JSON array", path.display()),
            )
            .with_selected(kind.data_key())
            .into()),
            Err(e) => Err(PipelineError::new(
                ErrorKind::CorruptedDataSection,
                format!("{} could not be parsed: {e}", path.display()),
            )
            .with_selected(kind.data_key())
            .into()),
        }
    }

    /// Parsed records of `kind`, read from disk on first use
    async fn records(&self, kind: EntityKind) -> Result<Arc<Vec<Value>>> {
        let mut cache = self.cache.lock().await;
        if let Some(records) = cache.get(&kind) {
            return Ok(Arc::clone(records));
        }
        let records = Arc::new(self.load(kind).await?);
        tracing::debug!(kind = %kind, records = records.len(), "Loaded kind file");
        cache.insert(kind, Arc::clone(&records));
        Ok(records)
    }

    async fn persist(&self, kind: EntityKind, records: Vec<Value>) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.path_for(kind);
        let staging = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        self.cache.lock().await.insert(kind, Arc::new(records));
        Ok(())
    }

    async fn children(&self, kind: EntityKind, field: &str, parent_id: &str) -> Result<Vec<RawValue>> {
        Ok(self
            .records(kind)
            .await?
            .iter()
            .filter(|record| record.get(field).and_then(Value::as_str) == Some(parent_id))
            .cloned()
            .map(RawValue::Json)
            .collect())
    }
}

#[async_trait]
impl Store for JsonDirStore {
    async fn get_entities(&self, kind: EntityKind) -> Result<Vec<RawValue>> {
        Ok(self
            .records(kind)
            .await?
            .iter()
            .cloned()
            .map(RawValue::Json)
            .collect())
    }

    async fn get_sale_items(&self, sale_id: &str) -> Result<Vec<RawValue>> {
        self.children(EntityKind::SaleItem, "sale_id", sale_id).await
    }

    async fn get_bulk_pricing_tiers(&self, product_id: &str) -> Result<Vec<RawValue>> {
        self.children(EntityKind::BulkPricingTier, "product_id", product_id)
            .await
    }

    async fn write_batch(&self, kind: EntityKind, records: Vec<Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored: Vec<RawValue> = self
            .records(kind)
            .await?
            .iter()
            .cloned()
            .map(RawValue::Json)
            .collect();
        for record in records {
            upsert(&mut stored, record);
        }
        let plain: Vec<Value> = stored
            .into_iter()
            .filter_map(|record| match record {
                RawValue::Json(value) => Some(value),
                _ => None,
            })
            .collect();
        tracing::debug!(kind = %kind, records = plain.len(), "Persisting kind file");
        self.persist(kind, plain).await
    }

    async fn remove_batch(&self, kind: EntityKind, ids: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.records(kind).await?.as_ref().clone();
        stored.retain(|record| {
            record
                .get("id")
                .and_then(Value::as_str)
                .map_or(true, |id| !ids.iter().any(|removed| removed == id))
        });
        self.persist(kind, stored).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(store.get_entities(EntityKind::Expense).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path());
        store
            .write_batch(
                EntityKind::StockMovement,
                vec![json!({"id": "m1", "product_id": "p1", "quantity": 3, "movement_type": "in"})],
            )
            .await
            .unwrap();

        assert!(dir.path().join("stockMovements.json").exists());
        let records = store.get_entities(EntityKind::StockMovement).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("movement_type").as_deref(), Some("in"));

        store
            .remove_batch(EntityKind::StockMovement, &["m1".to_string()])
            .await
            .unwrap();
        assert!(store.get_entities(EntityKind::StockMovement).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_file_is_a_corrupted_section() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("products.json"), "{not json").unwrap();
        let store = JsonDirStore::new(dir.path());

        let err = store.get_entities(EntityKind::Product).await.unwrap_err();
        assert_eq!(err.typed_kind(), Some(ErrorKind::CorruptedDataSection));
    }

    #[tokio::test]
    async fn test_kind_file_is_parsed_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("saleItems.json"),
            serde_json::to_vec(&json!([
                {"id": "i1", "sale_id": "s1", "product_id": "p1", "quantity": 1, "price": 2.0},
                {"id": "i2", "sale_id": "s2", "product_id": "p1", "quantity": 3, "price": 2.0},
            ]))
            .unwrap(),
        )
        .unwrap();
        let store = JsonDirStore::new(dir.path());
        assert_eq!(store.get_sale_items("s1").await.unwrap().len(), 1);

        // later lookups are served from the parsed copy
        std::fs::write(dir.path().join("saleItems.json"), "{not json").unwrap();
        assert_eq!(store.get_sale_items("s2").await.unwrap().len(), 1);
        assert!(store.get_sale_items("s3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_refresh_the_parsed_copy() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(store.get_entities(EntityKind::Customer).await.unwrap().is_empty());

        store
            .write_batch(EntityKind::Customer, vec![json!({"id": "c1", "name": "Ada"})])
            .await
            .unwrap();
        assert_eq!(store.get_entities(EntityKind::Customer).await.unwrap().len(), 1);

        let reopened = JsonDirStore::new(dir.path());
        assert_eq!(reopened.get_entities(EntityKind::Customer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_per_parent_lookup() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path());
        store
            .write_batch(
                EntityKind::BulkPricingTier,
                vec![
                    json!({"id": "t1", "product_id": "p1", "min_quantity": 10, "price": 1.5}),
                    json!({"id": "t2", "product_id": "p2", "min_quantity": 5, "price": 2.0}),
                ],
            )
            .await
            .unwrap();
        let tiers = store.get_bulk_pricing_tiers("p2").await.unwrap();
        assert_eq!(tiers.len(), 1);
    }
}
