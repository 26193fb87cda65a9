//! Import pipeline
//!
//! `Idle → Reading → Validating → Sanitizing → Importing → Done`.
//! Every store write is one all-or-nothing batch preceded by a checkpoint.
//! A batch whose failure resolves to rollback returns the store to the
//! checkpoint taken when the import started: records the import inserted are
//! removed and records it replaced are written back. The import then ends.

use super::engine::SnapshotEngine;
use super::envelope::recompute_checksum;
use super::progress::{Operation, PipelineStage, ProgressTracker};
use super::summary::{ImportSummary, RollbackInfo};
use super::verify::{parse_snapshot, satisfiable_selectors};
use crate::core::batch::BatchPlanner;
use crate::core::integrity::{
    count_mismatches, dangling_references, primary_id, validate_join_keys, DataSection,
    PRIMARY_KEYS,
};
use crate::core::recovery::{
    CheckpointLedger, PriorRecords, RecoveryAction, RecoveryFailure, RetryExecutor, WrittenState,
};
use crate::domain::entity::{DataTypeSelector, EntityKind};
use crate::domain::errors::{ErrorKind, PipelineError, VaultError};
use crate::domain::raw::RawValue;
use crate::domain::Result;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Store write order: referenced kinds before the kinds that reference them
pub const IMPORT_ORDER: [EntityKind; 10] = [
    EntityKind::Category,
    EntityKind::Supplier,
    EntityKind::Product,
    EntityKind::BulkPricingTier,
    EntityKind::Customer,
    EntityKind::Sale,
    EntityKind::SaleItem,
    EntityKind::ExpenseCategory,
    EntityKind::Expense,
    EntityKind::StockMovement,
];

fn import_order(selector: DataTypeSelector) -> impl Iterator<Item = EntityKind> {
    IMPORT_ORDER
        .into_iter()
        .filter(move |kind| selector.allows(*kind))
}

fn file_corrupted(path: &Path, message: &str, found: Vec<String>) -> VaultError {
    PipelineError::new(ErrorKind::FileCorrupted, message)
        .with_selected(path.display().to_string())
        .with_found(found)
        .with_hint("The file was modified or damaged. Re-export the data and try again")
        .into()
}

impl SnapshotEngine {
    /// Imports the records selected by `selector` from a snapshot file
    ///
    /// A rolled-back import still returns `Ok`; check
    /// [`ImportSummary::rollback`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation, if a
    /// write fails with a kind that needs user intervention, or if the import
    /// was cancelled.
    pub async fn import(&mut self, path: &Path, selector: DataTypeSelector) -> Result<ImportSummary> {
        let mut tracker = self.start_tracking(Operation::Import);
        let result = self.run_import(path, selector, &mut tracker).await;

        match &result {
            Ok(summary) => summary.log_summary(),
            Err(e) => {
                tracker.fail();
                crate::log_error_with_context!(e, format!("Import of {selector} failed"));
            }
        }
        self.stop_tracking(tracker);
        result
    }

    async fn run_import(
        &self,
        path: &Path,
        selector: DataTypeSelector,
        tracker: &mut ProgressTracker,
    ) -> Result<ImportSummary> {
        let started = Instant::now();
        let executor = self.executor();
        tracing::info!(
            path = %path.display(),
            data_type = %selector,
            dry_run = self.settings.dry_run,
            "Starting import"
        );

        // Reading
        tracker.enter(PipelineStage::Reading, 1)?;
        let bytes = executor
            .run("read snapshot", |_| self.files.read_file(path), |_| {})
            .await
            .map_err(|failure| VaultError::from(failure.into_pipeline_error()))?;
        let (raw, envelope) = parse_snapshot(&bytes, path)?;
        tracker.update(1);

        // Validating
        tracker.enter(PipelineStage::Validating, 3)?;
        if self.settings.verify_checksum {
            let actual = recompute_checksum(&raw, envelope.metadata.checksum_algorithm)?;
            if actual != envelope.integrity.checksum {
                return Err(file_corrupted(
                    path,
                    "Snapshot checksum does not match its content",
                    vec![format!(
                        "expected {}, computed {actual}",
                        envelope.integrity.checksum
                    )],
                ));
            }
        } else {
            tracing::warn!(path = %path.display(), "Checksum verification is disabled");
        }
        tracker.update(1);

        let mut mismatches = count_mismatches(&envelope.data, &envelope.integrity);
        let found_total: usize = envelope.data.values().map(Vec::len).sum();
        if envelope.metadata.record_count != found_total {
            mismatches.push(format!(
                "recordCount: recorded {}, found {found_total}",
                envelope.metadata.record_count
            ));
        }
        if !mismatches.is_empty() {
            return Err(file_corrupted(
                path,
                "Snapshot record counts do not match its data",
                mismatches,
            ));
        }
        tracker.update(2);

        let satisfiable = satisfiable_selectors(&envelope.data);
        if !satisfiable.contains(&selector) {
            let names: Vec<&str> = satisfiable.iter().map(DataTypeSelector::as_str).collect();
            let hint = if names.is_empty() {
                "The snapshot holds no complete data type. Re-export it".to_string()
            } else {
                format!("Select one of: {}", names.join(", "))
            };
            return Err(PipelineError::new(
                ErrorKind::MissingDataType,
                format!("Snapshot does not contain {selector} data"),
            )
            .with_selected(selector.as_str())
            .with_found(names)
            .with_hint(hint)
            .into());
        }

        let file_data_type = envelope.data_type;
        let mut source = envelope.data;
        let total: usize = selector
            .allowed_kinds()
            .iter()
            .map(|kind| source.get(kind.data_key()).map_or(0, Vec::len))
            .sum();
        if total == 0 {
            return Err(PipelineError::new(
                ErrorKind::EmptyDataType,
                format!("Snapshot contains no {selector} records"),
            )
            .with_selected(selector.as_str())
            .with_found(selector.allowed_kinds().iter().map(|k| format!("{}: 0", k.data_key())))
            .with_hint(format!("Export {selector} data first, or select a different data type"))
            .into());
        }
        tracker.update(3);

        let mut summary =
            ImportSummary::new(selector, file_data_type, path.to_path_buf(), self.settings.dry_run);
        summary.total_records = total;

        // Sanitizing
        tracker.enter(PipelineStage::Sanitizing, total)?;
        let sanitizer = self.sanitizer();
        let mut clean = DataSection::new();
        let mut processed = 0;
        for kind in import_order(selector) {
            let records: Vec<RawValue> = source
                .remove(kind.data_key())
                .unwrap_or_default()
                .into_iter()
                .map(RawValue::Json)
                .collect();
            let report = sanitizer.sanitize_all(&records, kind);
            summary.rejected_records += report.rejected.len();
            processed += report.total;
            tracker.update(processed);
            clean.insert(kind.data_key().to_string(), report.accepted);
        }

        let violations = validate_join_keys(&clean);
        if !violations.is_empty() {
            return Err(PipelineError::new(
                ErrorKind::ReferenceIntegrityError,
                format!("{} identifiers are not valid join keys", violations.len()),
            )
            .with_selected(path.display().to_string())
            .with_found(violations.iter().take(10).map(ToString::to_string))
            .with_hint("Identifiers must be UUID v4 strings. Fix the source data and re-export")
            .into());
        }
        for reference in dangling_references(&clean) {
            tracing::warn!(warning = %reference, "Dangling reference");
            summary.warnings.push(reference);
        }

        // Importing
        let accepted: usize = clean.values().map(Vec::len).sum();
        tracker.enter(PipelineStage::Importing, accepted)?;
        if self.settings.dry_run {
            self.plan_batches(&clean, selector, &mut summary, tracker);
        } else {
            self.write_batches(clean, selector, &executor, &mut summary, tracker)
                .await?;
        }

        if summary.rollback.is_some() {
            tracker.fail();
        } else {
            tracker.finish()?;
        }
        summary.duration = started.elapsed();
        Ok(summary)
    }

    /// Plans batches for a dry run without touching the store
    fn plan_batches(
        &self,
        clean: &DataSection,
        selector: DataTypeSelector,
        summary: &mut ImportSummary,
        tracker: &mut ProgressTracker,
    ) {
        let mut planner = BatchPlanner::new(&self.settings.batching);
        let mut processed = 0;
        for kind in import_order(selector) {
            let count = clean.get(kind.data_key()).map_or(0, Vec::len);
            let mut offset = 0;
            while offset < count {
                let size = planner.next_batch_size(count);
                let end = (offset + size).min(count);
                planner.record_batch(end - offset, Duration::ZERO);
                summary.batches += 1;
                processed += end - offset;
                tracker.update(processed);
                offset = end;
            }
            tracing::info!(kind = %kind, records = count, "Dry run: would write records");
        }
    }

    async fn write_batches(
        &self,
        mut clean: DataSection,
        selector: DataTypeSelector,
        executor: &RetryExecutor,
        summary: &mut ImportSummary,
        tracker: &mut ProgressTracker,
    ) -> Result<()> {
        let prior = self.capture_prior_records(&clean, selector, executor).await?;
        let mut planner = BatchPlanner::new(&self.settings.batching);
        let mut ledger = CheckpointLedger::new(self.settings.recovery.checkpoint_capacity);
        let start = ledger.begin(format!("import {selector}"), self.clock.now());
        summary.checkpoints += 1;
        let mut written = WrittenState::new();
        let mut processed = 0;

        for kind in import_order(selector) {
            let records = clean.remove(kind.data_key()).unwrap_or_default();
            let mut offset = 0;
            let mut batch_number = 0;
            while offset < records.len() {
                self.check_cancelled("importing")?;
                let size = planner.next_batch_size(records.len());
                let end = (offset + size).min(records.len());
                let batch = &records[offset..end];
                batch_number += 1;

                let operation = format!("write {} batch {batch_number}", kind.data_key());
                let written_so_far = written.values().map(Vec::len).sum();
                ledger.create(operation.clone(), &written, written_so_far, self.clock.now());
                summary.checkpoints += 1;

                let batch_started = Instant::now();
                let result = executor
                    .run(
                        &operation,
                        |_| self.store.write_batch(kind, batch.to_vec()),
                        |_| planner.request_reduction(),
                    )
                    .await;

                match result {
                    Ok(()) => {
                        planner.record_batch(batch.len(), batch_started.elapsed());
                        written
                            .entry(kind)
                            .or_default()
                            .extend(batch.iter().filter_map(primary_id).map(str::to_string));
                        *summary.written.entry(kind.data_key().to_string()).or_default() +=
                            batch.len();
                        summary.batches += 1;
                    }
                    Err(failure) => match failure.action {
                        RecoveryAction::Skip => {
                            tracing::warn!(
                                kind = %kind,
                                batch = batch_number,
                                records = batch.len(),
                                error_kind = %failure.kind,
                                "Skipped batch"
                            );
                            summary.skipped_records += batch.len();
                        }
                        RecoveryAction::Rollback => {
                            let info = self
                                .roll_back(&mut ledger, start, &written, &prior, summary, failure)
                                .await?;
                            summary.rollback = Some(info);
                            return Ok(());
                        }
                        _ => return Err(failure.into_pipeline_error().into()),
                    },
                }

                processed += batch.len();
                tracker.update(processed);
                offset = end;
                self.pause().await;
            }
        }

        Ok(())
    }

    /// Captures the stored version of every id the import is about to write
    async fn capture_prior_records(
        &self,
        clean: &DataSection,
        selector: DataTypeSelector,
        executor: &RetryExecutor,
    ) -> Result<PriorRecords> {
        let mut prior = PriorRecords::new();
        for kind in import_order(selector) {
            let incoming: BTreeSet<&str> = clean
                .get(kind.data_key())
                .into_iter()
                .flatten()
                .filter_map(primary_id)
                .collect();
            if incoming.is_empty() {
                continue;
            }

            let operation = format!("read existing {}", kind.data_key());
            let stored = executor
                .run(&operation, |_| self.store.get_entities(kind), |_| {})
                .await
                .map_err(|failure| VaultError::from(failure.into_pipeline_error()))?;

            let existing = prior.entry(kind).or_default();
            for record in stored {
                let Some(id) = PRIMARY_KEYS.iter().find_map(|key| record.get_str(key)) else {
                    continue;
                };
                if !incoming.contains(id.as_str()) {
                    continue;
                }
                let pre_image = match record.to_json() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(kind = %kind, id = %id, error = %e, "Stored record cannot be captured for rollback");
                        None
                    }
                };
                existing.insert(id, pre_image);
            }
            tracing::debug!(kind = %kind, replaced = existing.len(), "Captured records the import will replace");
        }
        Ok(prior)
    }

    /// Returns the store to checkpoint `target`
    ///
    /// Records written since the checkpoint are removed, or written back to
    /// their pre-import version when the import replaced them.
    async fn roll_back(
        &self,
        ledger: &mut CheckpointLedger,
        target: Uuid,
        written: &WrittenState,
        prior: &PriorRecords,
        summary: &mut ImportSummary,
        failure: RecoveryFailure,
    ) -> Result<RollbackInfo> {
        let checkpoint = ledger.rollback_to(target)?;
        let compensation = checkpoint.compensation(written, prior);

        for kind in IMPORT_ORDER.iter().rev() {
            if let Some(ids) = compensation.remove.get(kind) {
                self.store.remove_batch(*kind, ids).await?;
            }
            if let Some(records) = compensation.restore.get(kind) {
                self.store.write_batch(*kind, records.clone()).await?;
            }
        }
        for (kind, ids) in checkpoint.written_since(written) {
            if let Some(count) = summary.written.get_mut(kind.data_key()) {
                *count = count.saturating_sub(ids.len());
            }
        }
        if compensation.unrestorable > 0 {
            tracing::warn!(
                records = compensation.unrestorable,
                "Replaced records without a captured version were left as imported"
            );
        }

        let removed_records = compensation.removed_records();
        let restored_records = compensation.restored_records();
        let message = format!(
            "{} Removed {removed_records} and restored {restored_records} records written since '{}'",
            failure.policy.user_message, checkpoint.operation
        );
        tracing::error!(
            checkpoint_id = %checkpoint.id,
            kind = %failure.kind,
            attempts = failure.attempts,
            removed_records,
            restored_records,
            error = %failure.error,
            "Import rolled back"
        );

        Ok(RollbackInfo {
            checkpoint_id: checkpoint.id,
            kind: failure.kind,
            message,
            removed_records,
            restored_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_order_respects_references() {
        let position = |kind| IMPORT_ORDER.iter().position(|k| *k == kind).unwrap();
        for kind in IMPORT_ORDER {
            for field in ["product_id", "category_id", "supplier_id", "sale_id", "customer_id"] {
                let Some(target) = EntityKind::referenced_by(field) else {
                    continue;
                };
                if kind.schema().required_field(field).is_some() {
                    assert!(position(target) < position(kind), "{kind} before {target}");
                }
            }
        }
        assert!(position(EntityKind::ExpenseCategory) < position(EntityKind::Expense));
    }

    #[test]
    fn test_import_order_is_narrowed_by_selector() {
        let kinds: Vec<EntityKind> = import_order(DataTypeSelector::Sales).collect();
        assert_eq!(kinds, vec![EntityKind::Sale, EntityKind::SaleItem]);
        assert_eq!(import_order(DataTypeSelector::Complete).count(), 10);
    }
}
