//! Snapshot envelope format
//!
//! An envelope is the unit of export: a pretty-printed UTF-8 JSON object with
//! camelCase fields. Its checksum covers the whole envelope serialized
//! canonically with `integrity.checksum` set to `""`.

use crate::core::integrity::{calculate_checksum, ChecksumAlgorithm, DataSection, IntegrityBlock};
use crate::domain::entity::DataTypeSelector;
use crate::domain::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot format version written by this build
pub const SNAPSHOT_VERSION: &str = "2.0";

/// Snapshot versions this build can import
pub const SUPPORTED_VERSIONS: &[&str] = &[SNAPSHOT_VERSION];

/// Versioned, checksummed export of shop data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvelope {
    /// Format version
    pub version: String,
    /// When the snapshot was taken
    pub export_date: DateTime<Utc>,
    /// Scope of the snapshot
    pub data_type: DataTypeSelector,
    /// Counts and diagnostics
    pub metadata: SnapshotMetadata,
    /// Records per data key
    pub data: DataSection,
    /// Point-in-time name lookups
    pub relationships: RelationshipMap,
    /// Checksum, counts, rule manifest
    pub integrity: IntegrityBlock,
}

/// `metadata` block of an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Total records across `data`
    pub record_count: usize,
    /// Whether the export matched no records
    pub empty_export: bool,
    /// Version of the producing application
    #[serde(default)]
    pub app_version: String,
    /// Algorithm used for `integrity.checksum`
    #[serde(default)]
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Records the sanitizer rejected
    #[serde(default)]
    pub rejected_records: usize,
    /// Numeric fields coerced to zero
    #[serde(default)]
    pub coerced_fields: usize,
    /// Identifier and reference warnings
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Denormalized id-to-name lookups captured at export time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMap {
    /// Category id to category name
    #[serde(default)]
    pub product_categories: BTreeMap<String, String>,
    /// Supplier id to supplier name
    #[serde(default)]
    pub product_suppliers: BTreeMap<String, String>,
    /// Customer id to customer name
    #[serde(default)]
    pub sale_customers: BTreeMap<String, String>,
}

impl RelationshipMap {
    /// Builds an id-to-name lookup from a list of records
    pub fn lookup(records: &[Value]) -> BTreeMap<String, String> {
        records
            .iter()
            .filter_map(|record| {
                let id = record.get("id").and_then(Value::as_str)?;
                let name = record.get("name").and_then(Value::as_str)?;
                Some((id.to_string(), name.to_string()))
            })
            .collect()
    }
}

impl SnapshotEnvelope {
    /// Computes and stores the checksum
    pub fn seal(&mut self, algorithm: ChecksumAlgorithm) -> Result<()> {
        self.metadata.checksum_algorithm = algorithm;
        self.integrity.checksum.clear();
        let value = serde_json::to_value(&*self)?;
        self.integrity.checksum = calculate_checksum(&value, algorithm)?;
        Ok(())
    }

    /// Pretty-printed JSON bytes
    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Recomputes the checksum of a parsed envelope
///
/// Works on the raw JSON so fields this build does not model still count.
pub fn recompute_checksum(envelope: &Value, algorithm: ChecksumAlgorithm) -> Result<String> {
    let mut unsealed = envelope.clone();
    if let Some(checksum) = unsealed.pointer_mut("/integrity/checksum") {
        *checksum = Value::String(String::new());
    }
    calculate_checksum(&unsealed, algorithm)
}

/// File name of an export: `{dataType}_export_{YYYY-MM-DD}[_empty].json`
pub fn export_file_name(selector: DataTypeSelector, date: DateTime<Utc>, empty: bool) -> String {
    format!(
        "{}_export_{}{}.json",
        selector.as_str(),
        date.format("%Y-%m-%d"),
        if empty { "_empty" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::integrity::build_integrity;
    use chrono::TimeZone;
    use serde_json::json;

    fn envelope() -> SnapshotEnvelope {
        let mut data = DataSection::new();
        data.insert(
            "customers".to_string(),
            vec![json!({"id": "c1", "name": "Ada"})],
        );
        let integrity = build_integrity(&data, DataTypeSelector::Customers);
        SnapshotEnvelope {
            version: SNAPSHOT_VERSION.to_string(),
            export_date: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            data_type: DataTypeSelector::Customers,
            metadata: SnapshotMetadata {
                record_count: 1,
                empty_export: false,
                app_version: "test".to_string(),
                checksum_algorithm: ChecksumAlgorithm::Rolling32,
                rejected_records: 0,
                coerced_fields: 0,
                warnings: Vec::new(),
            },
            data,
            relationships: RelationshipMap::default(),
            integrity,
        }
    }

    #[test]
    fn test_seal_matches_recompute() {
        let mut env = envelope();
        env.seal(ChecksumAlgorithm::Rolling32).unwrap();
        assert!(!env.integrity.checksum.is_empty());

        let value = serde_json::to_value(&env).unwrap();
        let recomputed = recompute_checksum(&value, ChecksumAlgorithm::Rolling32).unwrap();
        assert_eq!(recomputed, env.integrity.checksum);
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let mut first = envelope();
        first.seal(ChecksumAlgorithm::Rolling32).unwrap();
        let mut second = envelope();
        second.data.get_mut("customers").unwrap()[0]["name"] = json!("Bea");
        second.seal(ChecksumAlgorithm::Rolling32).unwrap();
        assert_ne!(first.integrity.checksum, second.integrity.checksum);
    }

    #[test]
    fn test_fields_are_camel_case() {
        let value = serde_json::to_value(envelope()).unwrap();
        assert!(value.get("exportDate").is_some());
        assert_eq!(value["dataType"], "customers");
        assert_eq!(value["metadata"]["recordCount"], 1);
        assert_eq!(value["metadata"]["emptyExport"], false);
        assert!(value["integrity"]["recordCounts"].is_object());
        assert!(value["integrity"]["validationRules"].is_array());
        assert!(value["relationships"]["productCategories"].is_object());
    }

    #[test]
    fn test_export_file_name() {
        let date = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(
            export_file_name(DataTypeSelector::StockMovements, date, false),
            "stock_movements_export_2024-03-09.json"
        );
        assert_eq!(
            export_file_name(DataTypeSelector::Sales, date, true),
            "sales_export_2024-03-09_empty.json"
        );
    }

    #[test]
    fn test_lookup_skips_records_without_names() {
        let lookup = RelationshipMap::lookup(&[
            json!({"id": "a", "name": "Drinks"}),
            json!({"id": "b"}),
        ]);
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup["a"], "Drinks");
    }
}
