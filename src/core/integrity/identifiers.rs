//! Identifier shape and reference checks
//!
//! Primary keys (`id`, `_id`) and foreign keys (any `*_id` field) must be
//! hyphenated UUID v4 strings. Export only warns about violations; import
//! treats them as fatal because they are used as join keys.

use super::DataSection;
use crate::domain::entity::EntityKind;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::{Uuid, Variant};

/// Field names treated as primary keys
pub const PRIMARY_KEYS: [&str; 2] = ["id", "_id"];

/// Whether `text` is a canonical hyphenated UUID v4
pub fn is_uuid_v4(text: &str) -> bool {
    if text.len() != 36 {
        return false;
    }
    match Uuid::try_parse(text) {
        Ok(uuid) => uuid.get_version_num() == 4 && uuid.get_variant() == Variant::RFC4122,
        Err(_) => false,
    }
}

/// A malformed or missing identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierViolation {
    /// Data section key of the record
    pub data_key: String,
    /// Index of the record within its section
    pub index: usize,
    /// Offending field
    pub field: String,
    /// Offending value, `None` when the primary key is missing
    pub value: Option<String>,
}

impl fmt::Display for IdentifierViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(
                f,
                "{}[{}].{} is not a valid UUID: {}",
                self.data_key, self.index, self.field, value
            ),
            None => write!(
                f,
                "{}[{}] has no primary id",
                self.data_key, self.index
            ),
        }
    }
}

fn is_identifier_field(field: &str) -> bool {
    PRIMARY_KEYS.contains(&field) || field.ends_with("_id")
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Checks every identifier-shaped field of every record
///
/// Null foreign keys are allowed; absent fields are not checked.
pub fn validate_identifiers(data: &DataSection) -> Vec<IdentifierViolation> {
    let mut violations = Vec::new();
    for (data_key, records) in data {
        for (index, record) in records.iter().enumerate() {
            let Some(fields) = record.as_object() else {
                continue;
            };
            for (field, value) in fields {
                if !is_identifier_field(field) || value.is_null() {
                    continue;
                }
                let valid = value.as_str().is_some_and(is_uuid_v4);
                if !valid {
                    violations.push(IdentifierViolation {
                        data_key: data_key.clone(),
                        index,
                        field: field.clone(),
                        value: Some(render(value)),
                    });
                }
            }
        }
    }
    violations
}

/// Like [`validate_identifiers`], but also requires a primary key on every record
pub fn validate_join_keys(data: &DataSection) -> Vec<IdentifierViolation> {
    let mut violations = validate_identifiers(data);
    for (data_key, records) in data {
        for (index, record) in records.iter().enumerate() {
            let has_primary = record
                .as_object()
                .is_some_and(|fields| PRIMARY_KEYS.iter().any(|key| fields.contains_key(*key)));
            if !has_primary {
                violations.push(IdentifierViolation {
                    data_key: data_key.clone(),
                    index,
                    field: "id".to_string(),
                    value: None,
                });
            }
        }
    }
    violations
}

/// Primary key of a record, if it has one
pub fn primary_id(record: &Value) -> Option<&str> {
    PRIMARY_KEYS
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
}

/// Foreign keys pointing at ids absent from a section that is present
///
/// References into kinds the envelope does not carry are not reported.
pub fn dangling_references(data: &DataSection) -> Vec<String> {
    let known: BTreeMap<EntityKind, HashSet<&str>> = data
        .iter()
        .filter_map(|(key, records)| {
            EntityKind::from_data_key(key)
                .map(|kind| (kind, records.iter().filter_map(primary_id).collect()))
        })
        .collect();

    let mut warnings = Vec::new();
    for (data_key, records) in data {
        for (index, record) in records.iter().enumerate() {
            let Some(fields) = record.as_object() else {
                continue;
            };
            for (field, value) in fields {
                let Some(target) = EntityKind::referenced_by(field) else {
                    continue;
                };
                let (Some(ids), Some(id)) = (known.get(&target), value.as_str()) else {
                    continue;
                };
                if !ids.contains(id) {
                    warnings.push(format!(
                        "{data_key}[{index}].{field} references missing {target} {id}"
                    ));
                }
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn test_uuid_v4_shape() {
        assert!(is_uuid_v4(&id()));
        assert!(is_uuid_v4(&id().to_uppercase()));
        // version 1
        assert!(!is_uuid_v4("6fa459ea-ee8a-11ca-8a0e-00a0c91e6bf6"));
        // simple form without hyphens
        assert!(!is_uuid_v4(&Uuid::new_v4().simple().to_string()));
        assert!(!is_uuid_v4("product-1"));
    }

    #[test]
    fn test_validate_identifiers_collects_violations() {
        let mut data = DataSection::new();
        data.insert(
            "products".to_string(),
            vec![
                json!({"id": id(), "category_id": id(), "name": "ok"}),
                json!({"id": "42", "category_id": null, "name": "bad id"}),
                json!({"id": id(), "supplier_id": 7, "name": "bad fk"}),
            ],
        );

        let violations = validate_identifiers(&data);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].index, 1);
        assert_eq!(violations[0].field, "id");
        assert_eq!(violations[1].field, "supplier_id");
        assert_eq!(violations[1].value.as_deref(), Some("7"));
        assert!(violations[0].to_string().contains("products[1].id"));
    }

    #[test]
    fn test_join_keys_require_primary_id() {
        let mut data = DataSection::new();
        data.insert("customers".to_string(), vec![json!({"name": "Ada"})]);
        assert!(validate_identifiers(&data).is_empty());
        let violations = validate_join_keys(&data);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].value, None);
    }

    #[test]
    fn test_dangling_references_only_for_present_kinds() {
        let sale_id = id();
        let missing = id();
        let mut data = DataSection::new();
        data.insert("sales".to_string(), vec![json!({"id": sale_id, "total": 5})]);
        data.insert(
            "saleItems".to_string(),
            vec![
                json!({"id": id(), "sale_id": sale_id, "product_id": id()}),
                json!({"id": id(), "sale_id": missing, "product_id": id()}),
            ],
        );

        let warnings = dangling_references(&data);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("saleItems[1].sale_id"));
    }
}
