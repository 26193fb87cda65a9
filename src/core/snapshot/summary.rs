//! Export and import summaries
//!
//! This module defines structures for tracking and reporting the results of
//! snapshot operations.

use super::envelope::SnapshotEnvelope;
use crate::domain::entity::DataTypeSelector;
use crate::domain::errors::ErrorKind;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Summary of an export operation
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Exported scope
    pub data_type: DataTypeSelector,

    /// Where the snapshot was written
    pub path: PathBuf,

    /// Records per data key, as written
    pub record_counts: BTreeMap<String, usize>,

    /// Total records written
    pub total_records: usize,

    /// Records the sanitizer rejected
    pub rejected_records: usize,

    /// Numeric fields coerced to zero
    pub coerced_fields: usize,

    /// Unserializable fields dropped from kept records
    pub dropped_fields: usize,

    /// Data keys removed by the final structure check
    pub removed_kinds: Vec<String>,

    /// Kinds whose fetch failed and were exported empty
    pub skipped_sections: Vec<String>,

    /// Identifier and reference warnings
    pub warnings: Vec<String>,

    /// Whether nothing matched the selector
    pub empty_export: bool,

    /// Envelope checksum
    pub checksum: String,

    /// Per-parent batches streamed
    pub batches: usize,

    /// Duration of the export
    pub duration: Duration,
}

impl ExportSummary {
    /// Whether the export finished with anything worth a second look
    pub fn has_warnings(&self) -> bool {
        self.rejected_records > 0
            || self.coerced_fields > 0
            || !self.warnings.is_empty()
            || !self.skipped_sections.is_empty()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            data_type = %self.data_type,
            path = %self.path.display(),
            total_records = self.total_records,
            rejected = self.rejected_records,
            coerced = self.coerced_fields,
            dropped_fields = self.dropped_fields,
            empty_export = self.empty_export,
            batches = self.batches,
            duration_ms = self.duration.as_millis() as u64,
            checksum = %self.checksum,
            "Export completed"
        );

        if self.has_warnings() {
            tracing::warn!(
                warning_count = self.warnings.len(),
                skipped_sections = ?self.skipped_sections,
                "Export completed with warnings"
            );
        }
    }
}

/// Result of a successful export call
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// Written envelope
    pub envelope: SnapshotEnvelope,
    /// Summary
    pub summary: ExportSummary,
}

/// Details of a rolled-back import
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackInfo {
    /// Checkpoint the store was restored to
    pub checkpoint_id: Uuid,
    /// Kind of the failure that triggered the rollback
    pub kind: ErrorKind,
    /// Operator-facing message
    pub message: String,
    /// Inserted records removed by compensation
    pub removed_records: usize,
    /// Replaced records written back to their pre-import version
    pub restored_records: usize,
}

/// Summary of an import operation
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// Requested scope
    pub data_type: DataTypeSelector,

    /// Scope recorded in the file
    pub file_data_type: DataTypeSelector,

    /// Imported file
    pub path: PathBuf,

    /// Records written per data key
    pub written: BTreeMap<String, usize>,

    /// Records considered for import
    pub total_records: usize,

    /// Records the sanitizer rejected
    pub rejected_records: usize,

    /// Records dropped with skipped batches
    pub skipped_records: usize,

    /// Batches written (or planned, in a dry run)
    pub batches: usize,

    /// Checkpoints taken, the import-start checkpoint included
    pub checkpoints: usize,

    /// Reference and identifier warnings
    pub warnings: Vec<String>,

    /// Whether this was a dry run
    pub dry_run: bool,

    /// Set when the import was rolled back
    pub rollback: Option<RollbackInfo>,

    /// Duration of the import
    pub duration: Duration,
}

impl ImportSummary {
    pub(crate) fn new(
        data_type: DataTypeSelector,
        file_data_type: DataTypeSelector,
        path: PathBuf,
        dry_run: bool,
    ) -> Self {
        Self {
            data_type,
            file_data_type,
            path,
            written: BTreeMap::new(),
            total_records: 0,
            rejected_records: 0,
            skipped_records: 0,
            batches: 0,
            checkpoints: 0,
            warnings: Vec::new(),
            dry_run,
            rollback: None,
            duration: Duration::ZERO,
        }
    }

    /// Total records written
    pub fn written_records(&self) -> usize {
        self.written.values().sum()
    }

    /// Whether the import was rolled back
    pub fn is_rolled_back(&self) -> bool {
        self.rollback.is_some()
    }

    /// Whether anything was skipped or warned about
    pub fn has_warnings(&self) -> bool {
        self.rejected_records > 0 || self.skipped_records > 0 || !self.warnings.is_empty()
    }

    /// Resolution message naming what was skipped and what was kept
    pub fn skip_message(&self) -> String {
        let skipped = self.rejected_records + self.skipped_records;
        let kept = self.total_records.saturating_sub(skipped);
        format!("Skipped {skipped} invalid records, kept {kept} valid records")
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            data_type = %self.data_type,
            path = %self.path.display(),
            total_records = self.total_records,
            written = self.written_records(),
            rejected = self.rejected_records,
            skipped = self.skipped_records,
            batches = self.batches,
            checkpoints = self.checkpoints,
            dry_run = self.dry_run,
            duration_ms = self.duration.as_millis() as u64,
            "Import completed"
        );

        if let Some(rollback) = &self.rollback {
            tracing::error!(
                checkpoint_id = %rollback.checkpoint_id,
                kind = %rollback.kind,
                removed_records = rollback.removed_records,
                restored_records = rollback.restored_records,
                "Import rolled back"
            );
        } else if self.has_warnings() {
            tracing::warn!(resolution = %self.skip_message(), "Import completed with warnings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_message_names_skipped_and_kept() {
        let mut summary = ImportSummary::new(
            DataTypeSelector::Products,
            DataTypeSelector::Products,
            PathBuf::from("products.json"),
            false,
        );
        summary.total_records = 10;
        summary.rejected_records = 2;
        summary.skipped_records = 3;
        assert_eq!(
            summary.skip_message(),
            "Skipped 5 invalid records, kept 5 valid records"
        );
        assert!(summary.has_warnings());
        assert!(!summary.is_rolled_back());
    }

    #[test]
    fn test_written_records_sums_kinds() {
        let mut summary = ImportSummary::new(
            DataTypeSelector::Sales,
            DataTypeSelector::Complete,
            PathBuf::from("complete.json"),
            false,
        );
        summary.written.insert("sales".to_string(), 2);
        summary.written.insert("saleItems".to_string(), 5);
        assert_eq!(summary.written_records(), 7);
    }
}
