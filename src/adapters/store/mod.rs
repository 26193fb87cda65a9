//! Shop database abstraction
//!
//! The snapshot engine reads entities through [`Store`] and writes only
//! through the checkpointed batch calls of the import path.

pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirStore;
pub use memory::{InMemoryStore, InjectedFailure};

use crate::domain::entity::EntityKind;
use crate::domain::raw::RawValue;
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Store collaborator consumed by the snapshot engine
///
/// Implementations must keep records of one kind in a stable order; the
/// engine relies on fetch order being write order.
#[async_trait]
pub trait Store: Send + Sync {
    /// All records of `kind`, in store order
    ///
    /// # Errors
    ///
    /// Returns an error if the kind cannot be read.
    async fn get_entities(&self, kind: EntityKind) -> Result<Vec<RawValue>>;

    /// Line items of one sale
    async fn get_sale_items(&self, sale_id: &str) -> Result<Vec<RawValue>>;

    /// Price tiers of one product
    async fn get_bulk_pricing_tiers(&self, product_id: &str) -> Result<Vec<RawValue>>;

    /// Writes a batch of records of one kind; all or nothing
    ///
    /// Records with an `id` already present replace the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was not applied. A failed call leaves the
    /// store unchanged.
    async fn write_batch(&self, kind: EntityKind, records: Vec<Value>) -> Result<()>;

    /// Removes records of `kind` by id; the compensating call used by rollback
    async fn remove_batch(&self, kind: EntityKind, ids: &[String]) -> Result<()>;
}

/// Inserts or replaces `record` in `records` by its `id`
pub(crate) fn upsert(records: &mut Vec<RawValue>, record: Value) {
    let id = record.get("id").and_then(Value::as_str).map(str::to_string);
    let existing = id.as_deref().and_then(|id| {
        records
            .iter()
            .position(|stored| stored.get_str("id").as_deref() == Some(id))
    });
    match existing {
        Some(position) => records[position] = RawValue::Json(record),
        None => records.push(RawValue::Json(record)),
    }
}
