//! Export pipeline
//!
//! `Idle → Fetching → Filtering → Sanitizing → BuildingIntegrity → Writing → Done`.
//! Child kinds (sale items, price tiers) are fetched per parent in
//! planner-sized batches; sanitizing also walks each kind in batches. The
//! engine yields between batches and checks for cancellation there.

use super::engine::SnapshotEngine;
use super::envelope::{export_file_name, RelationshipMap, SnapshotEnvelope, SnapshotMetadata};
use super::progress::{Operation, PipelineStage, ProgressTracker};
use super::summary::{ExportOutcome, ExportSummary};
use crate::core::batch::BatchPlanner;
use crate::core::integrity::{
    build_integrity, dangling_references, narrow_to_selector, validate_identifiers, DataSection,
    UUID_WARNING_RULE,
};
use crate::core::recovery::{RecoveryAction, RetryExecutor};
use crate::core::sanitize::Sanitizer;
use crate::domain::entity::{DataTypeSelector, EntityKind};
use crate::domain::errors::VaultError;
use crate::domain::raw::RawValue;
use crate::domain::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// Entity lists pulled from the store for one export
#[derive(Debug, Default)]
struct Fetched {
    records: BTreeMap<EntityKind, Vec<RawValue>>,
    skipped_sections: Vec<String>,
    batches: usize,
}

/// Kinds read with `get_entities` for `selector`
///
/// Child kinds are left out (they are fetched per parent), and parents or
/// lookup kinds the selector does not export are added.
fn fetch_plan(selector: DataTypeSelector) -> Vec<EntityKind> {
    let mut kinds: Vec<EntityKind> = selector
        .allowed_kinds()
        .iter()
        .copied()
        .filter(|kind| !is_child_kind(*kind))
        .collect();

    let mut require = |kind: EntityKind| {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    };
    if selector.allows(EntityKind::SaleItem) {
        require(EntityKind::Sale);
    }
    if selector.allows(EntityKind::BulkPricingTier) {
        require(EntityKind::Product);
    }
    // saleCustomers lookup
    if selector.allows(EntityKind::Sale) {
        require(EntityKind::Customer);
    }
    kinds
}

fn is_child_kind(kind: EntityKind) -> bool {
    matches!(kind, EntityKind::SaleItem | EntityKind::BulkPricingTier)
}

fn parent_of(child: EntityKind) -> EntityKind {
    match child {
        EntityKind::SaleItem => EntityKind::Sale,
        _ => EntityKind::Product,
    }
}

fn section<'a>(data: &'a DataSection, kind: EntityKind) -> &'a [Value] {
    data.get(kind.data_key()).map(Vec::as_slice).unwrap_or(&[])
}

/// Builds the name lookups for the kinds `selector` exports
fn build_relationships(
    selector: DataTypeSelector,
    data: &DataSection,
    lookups: &BTreeMap<EntityKind, Vec<RawValue>>,
) -> RelationshipMap {
    let mut relationships = RelationshipMap::default();

    if selector.allows(EntityKind::Product) {
        relationships.product_categories =
            RelationshipMap::lookup(section(data, EntityKind::Category));
        relationships.product_suppliers =
            RelationshipMap::lookup(section(data, EntityKind::Supplier));
    }

    if selector.allows(EntityKind::Sale) {
        relationships.sale_customers = if selector.allows(EntityKind::Customer) {
            RelationshipMap::lookup(section(data, EntityKind::Customer))
        } else {
            let customers: Vec<Value> = lookups
                .get(&EntityKind::Customer)
                .map(|records| records.iter().filter_map(|r| r.to_json().ok()).collect())
                .unwrap_or_default();
            RelationshipMap::lookup(&customers)
        };
    }

    relationships
}

impl SnapshotEngine {
    /// Exports the records selected by `selector` to a snapshot file
    ///
    /// An export that matches nothing still writes a well-formed envelope,
    /// flagged `emptyExport` and named with an `_empty` marker.
    ///
    /// # Errors
    ///
    /// Returns an error if a store read or the file write fails with a kind
    /// that is not skippable, or if the export was cancelled.
    pub async fn export(&mut self, selector: DataTypeSelector) -> Result<ExportOutcome> {
        let mut tracker = self.start_tracking(Operation::Export);
        let result = self.run_export(selector, &mut tracker).await;

        match &result {
            Ok(outcome) => outcome.summary.log_summary(),
            Err(e) => {
                tracker.fail();
                crate::log_error_with_context!(e, format!("Export of {selector} failed"));
            }
        }
        self.stop_tracking(tracker);
        result
    }

    async fn run_export(
        &self,
        selector: DataTypeSelector,
        tracker: &mut ProgressTracker,
    ) -> Result<ExportOutcome> {
        let started = Instant::now();
        let export_date = self.clock.now();
        let executor = self.executor();
        let sanitizer = self.sanitizer();
        let mut planner = BatchPlanner::new(&self.settings.batching);
        crate::log_export_start!(selector);

        // Fetching
        let plan = fetch_plan(selector);
        tracker.enter(PipelineStage::Fetching, plan.len())?;
        let mut fetched = Fetched::default();
        for (position, kind) in plan.iter().enumerate() {
            self.fetch_kind(&executor, *kind, &mut fetched).await?;
            tracker.update(position + 1);
        }
        for child in [EntityKind::SaleItem, EntityKind::BulkPricingTier] {
            if selector.allows(child) {
                self.fetch_children(&executor, &sanitizer, &mut planner, child, &mut fetched)
                    .await?;
            }
        }

        // Filtering
        let fetched_total: usize = fetched.records.values().map(Vec::len).sum();
        tracker.enter(PipelineStage::Filtering, fetched_total)?;
        let mut lookups = BTreeMap::new();
        let outside: Vec<EntityKind> = fetched
            .records
            .keys()
            .copied()
            .filter(|kind| !selector.allows(*kind))
            .collect();
        for kind in outside {
            if let Some(records) = fetched.records.remove(&kind) {
                tracing::debug!(
                    kind = %kind,
                    count = records.len(),
                    "Kept outside the export; used for lookups only"
                );
                lookups.insert(kind, records);
            }
        }
        tracker.update(fetched_total);

        // Sanitizing
        let total: usize = fetched.records.values().map(Vec::len).sum();
        tracker.enter(PipelineStage::Sanitizing, total)?;
        let mut data = DataSection::new();
        let mut rejected_records = 0;
        let mut coerced_fields = 0;
        let mut dropped_fields = 0;
        let mut processed = 0;
        for kind in selector.allowed_kinds() {
            let records = fetched.records.remove(kind).unwrap_or_default();
            let mut accepted = Vec::with_capacity(records.len());
            let mut offset = 0;
            while offset < records.len() {
                self.check_cancelled("sanitizing")?;
                let size = planner.next_batch_size(records.len());
                let end = (offset + size).min(records.len());
                let batch_started = Instant::now();

                let report = sanitizer.sanitize_batch(&records[offset..end], *kind, offset);
                rejected_records += report.rejected.len();
                coerced_fields += report.coerced_fields;
                dropped_fields += report.dropped_fields;
                accepted.extend(report.accepted);

                planner.record_batch(end - offset, batch_started.elapsed());
                processed += end - offset;
                tracker.update(processed);
                offset = end;
                self.pause().await;
            }
            tracing::info!(
                kind = %kind,
                accepted = accepted.len(),
                total = records.len(),
                "Sanitized records"
            );
            data.insert(kind.data_key().to_string(), accepted);
        }

        let violations = validate_identifiers(&data);
        let mut warnings: Vec<String> = violations.iter().map(ToString::to_string).collect();
        if !violations.is_empty() {
            tracing::warn!(
                count = violations.len(),
                "Identifiers that are not UUID v4 were exported"
            );
        }
        for reference in dangling_references(&data) {
            tracing::warn!(warning = %reference, "Dangling reference");
            warnings.push(reference);
        }

        // BuildingIntegrity
        tracker.enter(PipelineStage::BuildingIntegrity, 1)?;
        narrow_to_selector(&mut data, selector);
        let mut integrity = build_integrity(&data, selector);
        if !violations.is_empty() {
            integrity.validation_rules.push(UUID_WARNING_RULE.to_string());
        }
        let record_count = integrity.total_records();
        let empty_export = record_count == 0;
        let relationships = build_relationships(selector, &data, &lookups);
        let mut envelope = SnapshotEnvelope {
            version: self.settings.snapshot_version.clone(),
            export_date,
            data_type: selector,
            metadata: SnapshotMetadata {
                record_count,
                empty_export,
                app_version: self.settings.app_version.clone(),
                checksum_algorithm: self.settings.checksum_algorithm,
                rejected_records,
                coerced_fields,
                warnings: warnings.clone(),
            },
            data,
            relationships,
            integrity,
        };
        tracker.update(1);

        // Writing
        tracker.enter(PipelineStage::Writing, 1)?;
        let removed_kinds = narrow_to_selector(&mut envelope.data, selector);
        for key in &removed_kinds {
            tracing::error!(data_key = %key, "Removed data outside the selected data type before writing");
        }
        envelope.seal(self.settings.checksum_algorithm)?;
        let bytes = envelope.to_pretty_json()?;
        let path = self
            .settings
            .output_dir
            .join(export_file_name(selector, export_date, empty_export));
        executor
            .run(
                "write snapshot",
                |_| self.files.write_file(&path, &bytes),
                |_| {},
            )
            .await
            .map_err(|failure| VaultError::from(failure.into_pipeline_error()))?;
        tracker.update(1);
        tracker.finish()?;

        let summary = ExportSummary {
            data_type: selector,
            path,
            record_counts: envelope.integrity.record_counts.clone(),
            total_records: record_count,
            rejected_records,
            coerced_fields,
            dropped_fields,
            removed_kinds,
            skipped_sections: fetched.skipped_sections,
            warnings,
            empty_export,
            checksum: envelope.integrity.checksum.clone(),
            batches: fetched.batches,
            duration: started.elapsed(),
        };
        crate::log_export_complete!(summary.total_records, summary.duration);

        Ok(ExportOutcome { envelope, summary })
    }

    /// Reads one kind; a skippable failure leaves the section empty
    async fn fetch_kind(
        &self,
        executor: &RetryExecutor,
        kind: EntityKind,
        fetched: &mut Fetched,
    ) -> Result<()> {
        let operation = format!("fetch {}", kind.data_key());
        match executor
            .run(&operation, |_| self.store.get_entities(kind), |_| {})
            .await
        {
            Ok(records) => {
                tracing::debug!(kind = %kind, count = records.len(), "Fetched records");
                fetched.records.insert(kind, records);
                Ok(())
            }
            Err(failure) if failure.action == RecoveryAction::Skip => {
                tracing::warn!(
                    kind = %kind,
                    error_kind = %failure.kind,
                    "Skipping unreadable data section"
                );
                fetched.skipped_sections.push(kind.data_key().to_string());
                fetched.records.insert(kind, Vec::new());
                Ok(())
            }
            Err(failure) => Err(failure.into_pipeline_error().into()),
        }
    }

    /// Fetches `child` records parent by parent, in planner-sized batches of parents
    ///
    /// Only parents the sanitizer accepts are walked, so a rejected sale or
    /// product does not leave orphaned children in the snapshot.
    async fn fetch_children(
        &self,
        executor: &RetryExecutor,
        sanitizer: &Sanitizer,
        planner: &mut BatchPlanner,
        child: EntityKind,
        fetched: &mut Fetched,
    ) -> Result<()> {
        let parent_kind = parent_of(child);
        let parents = fetched.records.get(&parent_kind).map_or(&[][..], Vec::as_slice);
        let parent_ids: Vec<String> = parents
            .iter()
            .filter_map(|parent| sanitizer.sanitize(parent, parent_kind).ok())
            .filter_map(|clean| clean.fields.get("id").and_then(Value::as_str).map(str::to_string))
            .collect();
        if parent_ids.len() < parents.len() {
            tracing::debug!(
                kind = %child,
                parents = parents.len(),
                accepted = parent_ids.len(),
                "Not fetching children of rejected parents"
            );
        }

        let mut children = Vec::new();
        let mut offset = 0;
        while offset < parent_ids.len() {
            self.check_cancelled("fetching")?;
            let size = planner.next_batch_size(parent_ids.len());
            let end = (offset + size).min(parent_ids.len());
            let batch_started = Instant::now();
            let mut batch_records = 0;

            for parent_id in &parent_ids[offset..end] {
                let operation = format!("fetch {} of {parent_id}", child.data_key());
                let result = executor
                    .run(
                        &operation,
                        |_| match child {
                            EntityKind::SaleItem => self.store.get_sale_items(parent_id),
                            _ => self.store.get_bulk_pricing_tiers(parent_id),
                        },
                        |_| planner.request_reduction(),
                    )
                    .await;

                match result {
                    Ok(records) => {
                        batch_records += records.len();
                        children.extend(records);
                    }
                    Err(failure) if failure.action == RecoveryAction::Skip => {
                        tracing::warn!(
                            kind = %child,
                            parent_id = %parent_id,
                            error_kind = %failure.kind,
                            "Skipping unreadable child records"
                        );
                        fetched
                            .skipped_sections
                            .push(format!("{}[{parent_id}]", child.data_key()));
                    }
                    Err(failure) => return Err(failure.into_pipeline_error().into()),
                }
            }

            planner.record_batch(batch_records, batch_started.elapsed());
            fetched.batches += 1;
            crate::log_batch_processing!(end, parent_ids.len());
            offset = end;
            self.pause().await;
        }

        tracing::debug!(kind = %child, count = children.len(), "Fetched child records");
        fetched.records.insert(child, children);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_plan_adds_parents_and_lookups() {
        assert_eq!(
            fetch_plan(DataTypeSelector::Sales),
            vec![EntityKind::Sale, EntityKind::Customer]
        );
        assert_eq!(
            fetch_plan(DataTypeSelector::BulkPricing),
            vec![EntityKind::Product]
        );
        assert_eq!(
            fetch_plan(DataTypeSelector::Customers),
            vec![EntityKind::Customer]
        );
        let complete = fetch_plan(DataTypeSelector::Complete);
        assert_eq!(complete.len(), 8);
        assert!(!complete.iter().any(|kind| is_child_kind(*kind)));
    }

    #[test]
    fn test_sales_relationships_use_customer_lookup() {
        let mut data = DataSection::new();
        data.insert("sales".to_string(), vec![json!({"id": "s1", "customer_id": "c1"})]);
        let mut lookups = BTreeMap::new();
        lookups.insert(
            EntityKind::Customer,
            vec![RawValue::from(json!({"id": "c1", "name": "Ada"}))],
        );

        let relationships = build_relationships(DataTypeSelector::Sales, &data, &lookups);
        assert_eq!(relationships.sale_customers["c1"], "Ada");
        assert!(relationships.product_categories.is_empty());
    }

    #[test]
    fn test_customer_export_builds_no_relationships() {
        let relationships =
            build_relationships(DataTypeSelector::Customers, &DataSection::new(), &BTreeMap::new());
        assert_eq!(relationships, RelationshipMap::default());
    }
}
