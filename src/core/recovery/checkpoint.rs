//! Checkpoint ledger for import rollback
//!
//! A checkpoint records which ids had been written to the store, per kind,
//! right before a state-mutating step. The ledger keeps the most recent
//! batch checkpoints in a bounded ring and evicts the oldest first. The
//! checkpoint taken when an import starts is held outside the ring, so the
//! whole import can always be undone.

use crate::domain::entity::EntityKind;
use crate::domain::errors::VaultError;
use crate::domain::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use uuid::Uuid;

/// Ids written to the store so far, per kind
pub type WrittenState = BTreeMap<EntityKind, Vec<String>>;

/// Records the store held before an import touched them, per kind and id
///
/// `None` marks a record that existed but could not be captured as JSON.
pub type PriorRecords = BTreeMap<EntityKind, BTreeMap<String, Option<Value>>>;

/// Store changes that undo the writes made after a checkpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compensation {
    /// Ids the import inserted; removed with `remove_batch`
    pub remove: WrittenState,
    /// Pre-import versions of records the import replaced; written back
    pub restore: BTreeMap<EntityKind, Vec<Value>>,
    /// Replaced records with no pre-image; left as imported
    pub unrestorable: usize,
}

impl Compensation {
    /// Records removed
    pub fn removed_records(&self) -> usize {
        self.remove.values().map(Vec::len).sum()
    }

    /// Records written back
    pub fn restored_records(&self) -> usize {
        self.restore.values().map(Vec::len).sum()
    }
}

/// A restorable marker of import progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Unique checkpoint id
    pub id: Uuid,
    /// When the checkpoint was taken
    pub timestamp: DateTime<Utc>,
    /// Step about to run, e.g. `write products batch 3`
    pub operation: String,
    /// Ids already written when the checkpoint was taken
    pub state: WrittenState,
    /// Records written so far
    pub records_processed: usize,
}

impl Checkpoint {
    /// Ids present in `current` but not in this checkpoint, per kind
    pub fn written_since(&self, current: &WrittenState) -> WrittenState {
        let mut newer = WrittenState::new();
        for (kind, ids) in current {
            let known = self.state.get(kind).map_or(0, Vec::len);
            if ids.len() > known {
                newer.insert(*kind, ids[known..].to_vec());
            }
        }
        newer
    }

    /// Changes that return the store to this checkpoint
    ///
    /// Ids written after the checkpoint are removed unless they existed
    /// before the import, in which case their prior version is restored. Ids
    /// the checkpoint already covers are left alone.
    pub fn compensation(&self, current: &WrittenState, prior: &PriorRecords) -> Compensation {
        let mut compensation = Compensation::default();
        for (kind, ids) in self.written_since(current) {
            let covered: BTreeSet<&String> = self.state.get(&kind).into_iter().flatten().collect();
            let existing = prior.get(&kind);
            let mut seen = BTreeSet::new();
            for id in ids {
                if covered.contains(&id) || !seen.insert(id.clone()) {
                    continue;
                }
                match existing.and_then(|records| records.get(&id)) {
                    Some(Some(record)) => compensation
                        .restore
                        .entry(kind)
                        .or_default()
                        .push(record.clone()),
                    Some(None) => compensation.unrestorable += 1,
                    None => compensation.remove.entry(kind).or_default().push(id),
                }
            }
        }
        compensation
    }
}

/// Bounded, FIFO-evicting ring of checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointLedger {
    capacity: usize,
    base: Option<Checkpoint>,
    checkpoints: VecDeque<Checkpoint>,
}

impl CheckpointLedger {
    /// Creates an empty ledger holding at most `capacity` checkpoints
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            base: None,
            checkpoints: VecDeque::with_capacity(capacity),
        }
    }

    /// Takes the checkpoint an operation starts from, with nothing written
    ///
    /// The base checkpoint is never evicted. Calling `begin` again starts a
    /// new operation and clears the ring.
    pub fn begin(&mut self, operation: impl Into<String>, timestamp: DateTime<Utc>) -> Uuid {
        let checkpoint = Checkpoint {
            id: Uuid::new_v4(),
            timestamp,
            operation: operation.into(),
            state: WrittenState::new(),
            records_processed: 0,
        };
        let id = checkpoint.id;
        tracing::debug!(checkpoint_id = %id, operation = %checkpoint.operation, "Created base checkpoint");
        self.checkpoints.clear();
        self.base = Some(checkpoint);
        id
    }

    /// Checkpoint taken by [`Self::begin`]
    pub fn base(&self) -> Option<&Checkpoint> {
        self.base.as_ref()
    }

    /// Records a checkpoint, evicting the oldest when full
    pub fn create(
        &mut self,
        operation: impl Into<String>,
        state: &WrittenState,
        records_processed: usize,
        timestamp: DateTime<Utc>,
    ) -> Uuid {
        let checkpoint = Checkpoint {
            id: Uuid::new_v4(),
            timestamp,
            operation: operation.into(),
            state: state.clone(),
            records_processed,
        };
        let id = checkpoint.id;

        if self.checkpoints.len() == self.capacity {
            if let Some(evicted) = self.checkpoints.pop_front() {
                tracing::debug!(checkpoint_id = %evicted.id, "Evicted oldest checkpoint");
            }
        }

        tracing::debug!(
            checkpoint_id = %id,
            operation = %checkpoint.operation,
            records_processed,
            "Created checkpoint"
        );
        self.checkpoints.push_back(checkpoint);
        id
    }

    /// Most recent checkpoint
    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints.back().or(self.base.as_ref())
    }

    /// Looks a checkpoint up by id
    pub fn get(&self, id: Uuid) -> Option<&Checkpoint> {
        self.base
            .iter()
            .chain(self.checkpoints.iter())
            .find(|checkpoint| checkpoint.id == id)
    }

    /// Discards every checkpoint newer than `id` and returns the target
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint was evicted or never existed.
    pub fn rollback_to(&mut self, id: Uuid) -> Result<Checkpoint> {
        if let Some(base) = self.base.as_ref().filter(|base| base.id == id) {
            let discarded = self.checkpoints.len();
            self.checkpoints.clear();
            tracing::info!(checkpoint_id = %id, discarded, "Rolled back to base checkpoint");
            return Ok(base.clone());
        }

        let position = self
            .checkpoints
            .iter()
            .position(|checkpoint| checkpoint.id == id)
            .ok_or_else(|| VaultError::Other(format!("Checkpoint {id} is not in the ledger")))?;

        let discarded = self.checkpoints.len() - position - 1;
        self.checkpoints.truncate(position + 1);
        tracing::info!(checkpoint_id = %id, discarded, "Rolled back to checkpoint");

        self.checkpoints
            .back()
            .cloned()
            .ok_or_else(|| VaultError::Other(format!("Checkpoint {id} is not in the ledger")))
    }

    /// Number of retained batch checkpoints
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Retained batch checkpoints, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }
}

impl Default for CheckpointLedger {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(products: &[&str]) -> WrittenState {
        let mut state = WrittenState::new();
        state.insert(
            EntityKind::Product,
            products.iter().map(|id| id.to_string()).collect(),
        );
        state
    }

    #[test]
    fn test_ring_is_bounded_and_fifo() {
        let mut ledger = CheckpointLedger::default();
        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(ledger.create(format!("batch {i}"), &WrittenState::new(), i, Utc::now()));
        }
        assert_eq!(ledger.len(), 10);
        assert!(ledger.get(ids[0]).is_none());
        assert!(ledger.get(ids[1]).is_none());
        assert!(ledger.get(ids[2]).is_some());
        assert_eq!(ledger.latest().map(|c| c.id), Some(ids[11]));
    }

    #[test]
    fn test_rollback_discards_newer() {
        let mut ledger = CheckpointLedger::new(5);
        let first = ledger.create("batch 0", &state(&[]), 0, Utc::now());
        let second = ledger.create("batch 1", &state(&["a"]), 1, Utc::now());
        ledger.create("batch 2", &state(&["a", "b"]), 2, Utc::now());

        let target = ledger.rollback_to(second).unwrap();
        assert_eq!(target.id, second);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.latest().map(|c| c.id), Some(second));
        assert!(ledger.get(first).is_some());
    }

    #[test]
    fn test_rollback_to_unknown_checkpoint_fails() {
        let mut ledger = CheckpointLedger::new(2);
        assert!(ledger.rollback_to(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_base_checkpoint_survives_eviction() {
        let mut ledger = CheckpointLedger::new(3);
        let base = ledger.begin("import products", Utc::now());
        for i in 0..5 {
            ledger.create(format!("batch {i}"), &state(&["a"]), i, Utc::now());
        }
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.base().map(|c| c.id), Some(base));

        let target = ledger.rollback_to(base).unwrap();
        assert!(target.state.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(ledger.latest().map(|c| c.id), Some(base));
    }

    #[test]
    fn test_compensation_restores_replaced_records() {
        let mut ledger = CheckpointLedger::new(4);
        let base = ledger.begin("import products", Utc::now());
        let checkpoint = ledger.get(base).unwrap().clone();

        let current = state(&["new-1", "existing", "new-2", "existing", "opaque"]);
        let mut prior = PriorRecords::new();
        let products = prior.entry(EntityKind::Product).or_default();
        products.insert("existing".to_string(), Some(serde_json::json!({"id": "existing", "name": "Old"})));
        products.insert("opaque".to_string(), None);

        let compensation = checkpoint.compensation(&current, &prior);
        assert_eq!(compensation.remove[&EntityKind::Product], vec!["new-1", "new-2"]);
        assert_eq!(compensation.restore[&EntityKind::Product].len(), 1);
        assert_eq!(compensation.restore[&EntityKind::Product][0]["name"], "Old");
        assert_eq!(compensation.unrestorable, 1);
        assert_eq!(compensation.removed_records(), 2);
        assert_eq!(compensation.restored_records(), 1);
    }

    #[test]
    fn test_written_since() {
        let mut ledger = CheckpointLedger::new(2);
        let id = ledger.create("batch 1", &state(&["a"]), 1, Utc::now());
        let checkpoint = ledger.get(id).unwrap();

        let mut current = state(&["a", "b", "c"]);
        current.insert(EntityKind::Category, vec!["x".to_string()]);
        let newer = checkpoint.written_since(&current);
        assert_eq!(newer[&EntityKind::Product], vec!["b", "c"]);
        assert_eq!(newer[&EntityKind::Category], vec!["x"]);
    }
}
