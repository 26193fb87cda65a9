//! Integrity manifest for snapshot envelopes
//!
//! Builds the `integrity` block of an envelope: per-kind record counts for
//! the kinds a selector allows, the selector's validation rule manifest, and
//! the checksum slot (filled in once the rest of the envelope is fixed).

pub mod checksum;
pub mod identifiers;

pub use checksum::{calculate_checksum, canonical_json, rolling32, ChecksumAlgorithm};
pub use identifiers::{
    dangling_references, is_uuid_v4, primary_id, validate_identifiers, validate_join_keys,
    IdentifierViolation, PRIMARY_KEYS,
};

use crate::domain::entity::DataTypeSelector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Data section of an envelope: data key (e.g. `saleItems`) to records
pub type DataSection = BTreeMap<String, Vec<Value>>;

/// Rule appended to the manifest when identifier violations were found on export
pub const UUID_WARNING_RULE: &str = "uuid_format_validation";

/// `integrity` block of a snapshot envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityBlock {
    /// Checksum of the envelope with this field set to `""`
    pub checksum: String,
    /// Records per data key
    pub record_counts: BTreeMap<String, usize>,
    /// Rules the data was checked against
    pub validation_rules: Vec<String>,
}

impl IntegrityBlock {
    /// Total records across all counted kinds
    pub fn total_records(&self) -> usize {
        self.record_counts.values().sum()
    }
}

/// Computes counts and rules for `data` under `selector`
///
/// The checksum is left empty; it is computed over the finished envelope.
pub fn build_integrity(data: &DataSection, selector: DataTypeSelector) -> IntegrityBlock {
    let record_counts = selector
        .allowed_kinds()
        .iter()
        .map(|kind| {
            let key = kind.data_key();
            (key.to_string(), data.get(key).map_or(0, Vec::len))
        })
        .collect();

    IntegrityBlock {
        checksum: String::new(),
        record_counts,
        validation_rules: selector
            .validation_rules()
            .iter()
            .map(|rule| rule.to_string())
            .collect(),
    }
}

/// Narrows a data section to exactly the kinds `selector` allows
///
/// Disallowed keys are removed (and returned); allowed keys that are missing
/// are added as empty arrays.
pub fn narrow_to_selector(data: &mut DataSection, selector: DataTypeSelector) -> Vec<String> {
    let allowed: Vec<&str> = selector
        .allowed_kinds()
        .iter()
        .map(|kind| kind.data_key())
        .collect();

    let removed: Vec<String> = data
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .cloned()
        .collect();
    for key in &removed {
        data.remove(key);
    }
    for key in allowed {
        data.entry(key.to_string()).or_default();
    }
    removed
}

/// Describes every disagreement between `recordCounts` and the data arrays
pub fn count_mismatches(data: &DataSection, integrity: &IntegrityBlock) -> Vec<String> {
    let mut mismatches = Vec::new();
    for (key, expected) in &integrity.record_counts {
        let actual = data.get(key).map_or(0, Vec::len);
        if actual != *expected {
            mismatches.push(format!("{key}: recorded {expected}, found {actual}"));
        }
    }
    for (key, records) in data {
        if !integrity.record_counts.contains_key(key) && !records.is_empty() {
            mismatches.push(format!("{key}: {} records not in recordCounts", records.len()));
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_integrity_counts_allowed_kinds_only() {
        let mut data = DataSection::new();
        data.insert("products".to_string(), vec![json!({}), json!({})]);
        data.insert("categories".to_string(), vec![json!({})]);

        let integrity = build_integrity(&data, DataTypeSelector::Products);
        assert_eq!(integrity.record_counts["products"], 2);
        assert_eq!(integrity.record_counts["categories"], 1);
        assert_eq!(integrity.record_counts["suppliers"], 0);
        assert_eq!(integrity.record_counts.len(), 4);
        assert!(integrity.checksum.is_empty());
        assert!(integrity
            .validation_rules
            .contains(&"positive_prices".to_string()));
    }

    #[test]
    fn test_narrow_removes_disallowed_and_fills_missing() {
        let mut data = DataSection::new();
        data.insert("sales".to_string(), vec![json!({"id": "s1"})]);
        data.insert("customers".to_string(), vec![json!({"id": "c1"})]);

        let removed = narrow_to_selector(&mut data, DataTypeSelector::Sales);
        assert_eq!(removed, vec!["customers".to_string()]);
        let keys: Vec<&String> = data.keys().collect();
        assert_eq!(keys, vec!["saleItems", "sales"]);
        assert!(data["saleItems"].is_empty());
    }

    #[test]
    fn test_count_mismatches() {
        let mut data = DataSection::new();
        data.insert("customers".to_string(), vec![json!({}), json!({})]);
        let mut integrity = build_integrity(&data, DataTypeSelector::Customers);
        assert!(count_mismatches(&data, &integrity).is_empty());
        assert_eq!(integrity.total_records(), 2);

        integrity.record_counts.insert("customers".to_string(), 3);
        let mismatches = count_mismatches(&data, &integrity);
        assert_eq!(mismatches, vec!["customers: recorded 3, found 2".to_string()]);
    }
}
