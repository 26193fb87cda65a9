//! Snapshot parsing and verification
//!
//! Shared by the importer, which aborts on the first problem, and by the
//! `verify` command, which reports every problem without importing.

use super::envelope::{recompute_checksum, SnapshotEnvelope, SUPPORTED_VERSIONS};
use crate::core::integrity::{
    count_mismatches, dangling_references, validate_join_keys, ChecksumAlgorithm, DataSection,
};
use crate::domain::entity::DataTypeSelector;
use crate::domain::errors::{ErrorKind, PipelineError};
use crate::domain::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Parses snapshot bytes into the raw JSON and the typed envelope
///
/// The raw value is kept so the checksum can be recomputed over exactly what
/// was written.
///
/// # Errors
///
/// * `invalid_file_format` - not JSON, or an unsupported version
/// * `invalid_data_structure` - JSON that is not a snapshot envelope
pub fn parse_snapshot(bytes: &[u8], path: &Path) -> Result<(Value, SnapshotEnvelope)> {
    let raw: Value = serde_json::from_slice(bytes).map_err(|e| {
        PipelineError::new(
            ErrorKind::InvalidFileFormat,
            format!("File is not valid JSON ({e})"),
        )
        .with_selected(path.display().to_string())
        .with_found([format!("{} bytes, not JSON", bytes.len())])
        .with_hint("Select a JSON snapshot produced by an export")
    })?;

    let version = raw.get("version").and_then(Value::as_str).unwrap_or_default();
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(PipelineError::new(
            ErrorKind::InvalidFileFormat,
            format!("Unsupported snapshot version '{version}'"),
        )
        .with_selected(path.display().to_string())
        .with_found([version])
        .with_hint(format!(
            "Supported versions: {}",
            SUPPORTED_VERSIONS.join(", ")
        ))
        .into());
    }

    let envelope: SnapshotEnvelope = serde_json::from_value(raw.clone()).map_err(|e| {
        PipelineError::new(
            ErrorKind::InvalidDataStructure,
            format!("Snapshot structure is invalid ({e})"),
        )
        .with_selected(path.display().to_string())
        .with_found(top_level_shape(&raw))
        .with_hint(format!(
            "A snapshot needs the keys {}. Re-export the data with a current version",
            ENVELOPE_KEYS.join(", ")
        ))
    })?;

    Ok((raw, envelope))
}

const ENVELOPE_KEYS: [&str; 7] = [
    "version",
    "exportDate",
    "dataType",
    "metadata",
    "data",
    "relationships",
    "integrity",
];

/// Top-level keys of an object, or the JSON type of anything else
fn top_level_shape(raw: &Value) -> Vec<String> {
    match raw {
        Value::Object(map) if map.is_empty() => vec!["empty object".to_string()],
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(_) => vec!["array".to_string()],
        Value::String(_) => vec!["string".to_string()],
        Value::Number(_) => vec!["number".to_string()],
        Value::Bool(_) => vec!["boolean".to_string()],
        Value::Null => vec!["null".to_string()],
    }
}

/// Selectors a data section can satisfy
///
/// A selector is satisfied when every kind it allows has a key in `data`.
pub fn satisfiable_selectors(data: &DataSection) -> Vec<DataTypeSelector> {
    DataTypeSelector::ALL
        .into_iter()
        .filter(|selector| {
            selector
                .allowed_kinds()
                .iter()
                .all(|kind| data.contains_key(kind.data_key()))
        })
        .collect()
}

/// Result of verifying a snapshot file
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Verified file
    pub path: PathBuf,

    /// Scope recorded in the file
    pub data_type: DataTypeSelector,

    /// Format version
    pub version: String,

    /// Algorithm named in the metadata
    pub algorithm: ChecksumAlgorithm,

    /// Checksum recorded in the file
    pub expected_checksum: String,

    /// Checksum recomputed from the file
    pub actual_checksum: String,

    /// Records per data key, as found
    pub record_counts: BTreeMap<String, usize>,

    /// Disagreements between `recordCounts` and the data arrays
    pub count_mismatches: Vec<String>,

    /// Malformed or missing join keys
    pub identifier_violations: Vec<String>,

    /// References to ids missing from the file
    pub dangling_references: Vec<String>,
}

impl VerificationReport {
    /// Builds the report for a parsed snapshot
    pub fn from_snapshot(path: &Path, raw: &Value, envelope: &SnapshotEnvelope) -> Result<Self> {
        let algorithm = envelope.metadata.checksum_algorithm;
        Ok(Self {
            path: path.to_path_buf(),
            data_type: envelope.data_type,
            version: envelope.version.clone(),
            algorithm,
            expected_checksum: envelope.integrity.checksum.clone(),
            actual_checksum: recompute_checksum(raw, algorithm)?,
            record_counts: envelope
                .data
                .iter()
                .map(|(key, records)| (key.clone(), records.len()))
                .collect(),
            count_mismatches: count_mismatches(&envelope.data, &envelope.integrity),
            identifier_violations: validate_join_keys(&envelope.data)
                .iter()
                .map(ToString::to_string)
                .collect(),
            dangling_references: dangling_references(&envelope.data),
        })
    }

    /// Whether the recorded checksum matches the content
    pub fn checksum_valid(&self) -> bool {
        self.expected_checksum == self.actual_checksum
    }

    /// Whether the file would pass import validation
    pub fn is_valid(&self) -> bool {
        self.checksum_valid()
            && self.count_mismatches.is_empty()
            && self.identifier_violations.is_empty()
    }

    /// Format the report as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("📊 Snapshot Verification Report\n");
        summary.push_str(&format!("  File: {}\n", self.path.display()));
        summary.push_str(&format!("  Data type: {}\n", self.data_type));
        summary.push_str(&format!("  Version: {}\n", self.version));
        summary.push_str(&format!(
            "  Records: {}\n",
            self.record_counts.values().sum::<usize>()
        ));
        for (key, count) in &self.record_counts {
            summary.push_str(&format!("    {key}: {count}\n"));
        }

        if self.checksum_valid() {
            summary.push_str(&format!("  ✅ Checksum ({}): {}\n", self.algorithm, self.actual_checksum));
        } else {
            summary.push_str(&format!(
                "  ❌ Checksum ({}): expected {}, computed {}\n",
                self.algorithm, self.expected_checksum, self.actual_checksum
            ));
        }

        if self.count_mismatches.is_empty() {
            summary.push_str("  ✅ Record counts agree\n");
        } else {
            summary.push_str("\n❌ Record count mismatches:\n");
            for mismatch in &self.count_mismatches {
                summary.push_str(&format!("  - {mismatch}\n"));
            }
        }

        if !self.identifier_violations.is_empty() {
            summary.push_str("\n❌ Identifier violations:\n");
            for violation in &self.identifier_violations {
                summary.push_str(&format!("  - {violation}\n"));
            }
        }

        if !self.dangling_references.is_empty() {
            summary.push_str("\n⚠️  Dangling references:\n");
            for reference in &self.dangling_references {
                summary.push_str(&format!("  - {reference}\n"));
            }
        }

        summary
    }
}
