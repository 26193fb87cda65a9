//! In-memory store
//!
//! Holds raw values per kind behind a mutex. Used by the test suite and by
//! callers that assemble a store programmatically. Write failures can be
//! injected to exercise the recovery paths.

use super::{upsert, Store};
use crate::domain::entity::EntityKind;
use crate::domain::errors::{ErrorKind, PipelineError, VaultError};
use crate::domain::raw::RawValue;
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Failure returned by an injected write fault
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    /// Untyped store error with a raw message, classified by message rules
    Untyped(String),
    /// Typed pipeline error
    Typed(ErrorKind, String),
}

impl InjectedFailure {
    fn to_error(&self) -> VaultError {
        match self {
            InjectedFailure::Untyped(message) => VaultError::Store(message.clone()),
            InjectedFailure::Typed(kind, message) => PipelineError::new(*kind, message.clone()).into(),
        }
    }
}

#[derive(Debug)]
struct WriteFault {
    kind: EntityKind,
    remaining: u32,
    failure: InjectedFailure,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<EntityKind, Vec<RawValue>>,
    faults: Vec<WriteFault>,
    write_calls: usize,
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| VaultError::Store("in-memory store lock poisoned".to_string()))
    }

    /// Replaces all records of `kind`
    pub fn insert_all(&self, kind: EntityKind, records: Vec<RawValue>) -> Result<()> {
        self.lock()?.records.insert(kind, records);
        Ok(())
    }

    /// Appends one record of `kind`
    pub fn push(&self, kind: EntityKind, record: impl Into<RawValue>) -> Result<()> {
        self.lock()?.records.entry(kind).or_default().push(record.into());
        Ok(())
    }

    /// Makes the next `times` writes of `kind` fail with `failure`
    pub fn fail_writes(&self, kind: EntityKind, times: u32, failure: InjectedFailure) -> Result<()> {
        self.lock()?.faults.push(WriteFault {
            kind,
            remaining: times,
            failure,
        });
        Ok(())
    }

    /// Number of `write_batch` calls, failed ones included
    pub fn write_calls(&self) -> usize {
        self.lock().map(|inner| inner.write_calls).unwrap_or(0)
    }

    /// Plain JSON copy of every stored record, per kind
    ///
    /// Records that cannot be converted are left out.
    pub fn dump(&self) -> Result<BTreeMap<EntityKind, Vec<Value>>> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .iter()
            .map(|(kind, records)| {
                (
                    *kind,
                    records.iter().filter_map(|record| record.to_json().ok()).collect(),
                )
            })
            .collect())
    }

    /// Number of records stored for `kind`
    pub fn count(&self, kind: EntityKind) -> usize {
        self.lock()
            .map(|inner| inner.records.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn children(&self, kind: EntityKind, field: &str, parent_id: &str) -> Result<Vec<RawValue>> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.get_str(field).as_deref() == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_entities(&self, kind: EntityKind) -> Result<Vec<RawValue>> {
        Ok(self.lock()?.records.get(&kind).cloned().unwrap_or_default())
    }

    async fn get_sale_items(&self, sale_id: &str) -> Result<Vec<RawValue>> {
        self.children(EntityKind::SaleItem, "sale_id", sale_id)
    }

    async fn get_bulk_pricing_tiers(&self, product_id: &str) -> Result<Vec<RawValue>> {
        self.children(EntityKind::BulkPricingTier, "product_id", product_id)
    }

    async fn write_batch(&self, kind: EntityKind, records: Vec<Value>) -> Result<()> {
        let mut inner = self.lock()?;
        inner.write_calls += 1;

        if let Some(fault) = inner
            .faults
            .iter_mut()
            .find(|fault| fault.kind == kind && fault.remaining > 0)
        {
            fault.remaining -= 1;
            return Err(fault.failure.to_error());
        }

        let stored = inner.records.entry(kind).or_default();
        for record in records {
            upsert(stored, record);
        }
        Ok(())
    }

    async fn remove_batch(&self, kind: EntityKind, ids: &[String]) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(stored) = inner.records.get_mut(&kind) {
            stored.retain(|record| {
                record
                    .get_str("id")
                    .map_or(true, |id| !ids.contains(&id))
            });
        }
        Ok(())
    }
}
