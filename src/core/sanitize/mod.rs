//! Per-record structural checks and defensive cleanup
//!
//! The [`Sanitizer`] turns a loosely typed [`RawValue`] from the store into a
//! plain JSON record of a known [`EntityKind`], or rejects it. Fields that
//! cannot be serialized (callables, cycles) are dropped; the record itself is
//! only rejected when it is not keyed, when a dropped field was required, or
//! when the kind's required-field schema is not met.

pub mod rules;

pub use rules::{coerce_numeric, strip_control_chars, Coercion, NumericPolicy};

use crate::domain::entity::{EntityKind, FieldType, NUMERIC_COLUMNS};
use crate::domain::errors::ErrorKind;
use crate::domain::raw::{ConversionError, RawNode, RawValue};
use serde_json::{Map, Value};
use thiserror::Error;

/// A cleaned record ready for the integrity builder
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedRecord {
    /// Plain JSON fields
    pub fields: Map<String, Value>,
    /// Names of fields dropped because they could not be serialized
    pub dropped_fields: Vec<String>,
    /// Names of numeric fields that fell back to `0`
    pub coerced_fields: Vec<String>,
}

impl SanitizedRecord {
    /// Consumes the record, returning it as a JSON object
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("record is not a keyed structure")]
    NotKeyed,

    #[error("record could not be read: {0}")]
    Unreadable(ConversionError),

    #[error("missing or invalid required field '{field}'")]
    MissingRequired { field: String },

    #[error("field '{field}' is not numeric")]
    NonNumeric { field: String },

    #[error("required field '{field}' was dropped: {reason}")]
    DroppedRequired {
        field: String,
        reason: ConversionError,
    },
}

impl Rejection {
    /// Error kind a rejection is reported under
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Rejection::NotKeyed | Rejection::Unreadable(_) => ErrorKind::MalformedRecords,
            Rejection::MissingRequired { .. } => ErrorKind::MissingRequiredFields,
            Rejection::NonNumeric { .. } => ErrorKind::InvalidNumericData,
            Rejection::DroppedRequired { reason, .. } => match reason {
                ConversionError::Circular { .. } | ConversionError::TooDeep { .. } => {
                    ErrorKind::CircularReference
                }
                _ => ErrorKind::MalformedRecords,
            },
        }
    }
}

/// A rejected record and where it sat in its input list
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Position in the fetched list
    pub index: usize,
    /// Kind the record was checked against
    pub kind: EntityKind,
    /// Reason
    pub rejection: Rejection,
}

/// Outcome of sanitizing a list of records
#[derive(Debug, Clone, Default)]
pub struct SanitizeReport {
    /// Accepted records, in input order
    pub accepted: Vec<Value>,
    /// Rejected records
    pub rejected: Vec<RejectedRecord>,
    /// Number of records inspected
    pub total: usize,
    /// Fields dropped across accepted records
    pub dropped_fields: usize,
    /// Numeric fields coerced to zero across accepted records
    pub coerced_fields: usize,
}

impl SanitizeReport {
    /// Folds another report into this one
    pub fn merge(&mut self, other: SanitizeReport) {
        self.accepted.extend(other.accepted);
        self.rejected.extend(other.rejected);
        self.total += other.total;
        self.dropped_fields += other.dropped_fields;
        self.coerced_fields += other.coerced_fields;
    }
}

/// Record sanitizer
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    policy: NumericPolicy,
}

impl Sanitizer {
    /// Creates a sanitizer with the given numeric policy
    pub fn new(policy: NumericPolicy) -> Self {
        Self { policy }
    }

    /// Numeric policy in effect
    pub fn policy(&self) -> NumericPolicy {
        self.policy
    }

    /// Sanitizes one record of `kind`
    ///
    /// Never mutates the input; the returned record is a fresh copy.
    pub fn sanitize(&self, record: &RawValue, kind: EntityKind) -> Result<SanitizedRecord, Rejection> {
        let entries = match record.fields() {
            Some(Ok(entries)) => entries,
            Some(Err(e)) => return Err(Rejection::Unreadable(e)),
            None => return Err(Rejection::NotKeyed),
        };

        let parent: Option<&RawNode> = match record {
            RawValue::Node(node) => Some(node),
            _ => None,
        };

        let mut fields = Map::new();
        let mut dropped: Vec<(String, ConversionError)> = Vec::new();
        for (key, value) in entries {
            match value.to_json_within(parent, &key) {
                Ok(json) => {
                    fields.insert(key, strip_control_chars(json));
                }
                Err(reason) => {
                    tracing::debug!(kind = %kind, field = %key, reason = %reason, "Dropping unserializable field");
                    dropped.push((key, reason));
                }
            }
        }

        let schema = kind.schema();
        if let Some((field, reason)) = dropped
            .iter()
            .find(|(name, _)| schema.required_field(name).is_some())
        {
            return Err(Rejection::DroppedRequired {
                field: field.clone(),
                reason: reason.clone(),
            });
        }

        let mut coerced_fields = Vec::new();
        for column in NUMERIC_COLUMNS {
            let Some(value) = fields.get_mut(column) else {
                continue;
            };
            match coerce_numeric(value, self.policy) {
                Coercion::Unchanged => {}
                Coercion::Parsed(number) => *value = number,
                Coercion::Zeroed => {
                    *value = Value::from(0);
                    coerced_fields.push(column.to_string());
                }
                Coercion::Rejected => {
                    return Err(Rejection::NonNumeric {
                        field: column.to_string(),
                    })
                }
            }
        }

        for required in schema.required {
            let present = match (required.field_type, fields.get(required.name)) {
                (FieldType::Text, Some(Value::String(text))) => !text.trim().is_empty(),
                (FieldType::Numeric, Some(Value::Number(_))) => true,
                _ => false,
            };
            if !present {
                return Err(Rejection::MissingRequired {
                    field: required.name.to_string(),
                });
            }
        }

        Ok(SanitizedRecord {
            fields,
            dropped_fields: dropped.into_iter().map(|(name, _)| name).collect(),
            coerced_fields,
        })
    }

    /// Sanitizes a whole list, logging one warning per rejected record
    pub fn sanitize_all(&self, records: &[RawValue], kind: EntityKind) -> SanitizeReport {
        let report = self.sanitize_batch(records, kind, 0);
        tracing::info!(
            kind = %kind,
            accepted = report.accepted.len(),
            total = report.total,
            "Sanitized records"
        );
        report
    }

    /// Sanitizes one batch; `offset` is the index of its first record in the full list
    pub fn sanitize_batch(&self, records: &[RawValue], kind: EntityKind, offset: usize) -> SanitizeReport {
        let mut report = SanitizeReport {
            total: records.len(),
            ..SanitizeReport::default()
        };

        for (position, record) in records.iter().enumerate() {
            let index = offset + position;
            match self.sanitize(record, kind) {
                Ok(clean) => {
                    report.dropped_fields += clean.dropped_fields.len();
                    report.coerced_fields += clean.coerced_fields.len();
                    if !clean.coerced_fields.is_empty() {
                        tracing::warn!(
                            kind = %kind,
                            index,
                            fields = ?clean.coerced_fields,
                            "Unparseable numeric fields coerced to 0"
                        );
                    }
                    report.accepted.push(clean.into_value());
                }
                Err(rejection) => {
                    tracing::warn!(
                        kind = %kind,
                        index,
                        error_kind = %rejection.error_kind(),
                        reason = %rejection,
                        "Rejected record"
                    );
                    report.rejected.push(RejectedRecord {
                        index,
                        kind,
                        rejection,
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(name: &str, price: Value) -> RawValue {
        RawValue::from(json!({
            "id": "6f1c2a4e-8b3d-4c5e-9f7a-1b2c3d4e5f60",
            "name": name,
            "price": price,
            "cost": 1.0
        }))
    }

    #[test]
    fn test_valid_record_is_kept() {
        let clean = Sanitizer::default()
            .sanitize(&product("Soap", json!(2.5)), EntityKind::Product)
            .unwrap();
        assert_eq!(clean.fields["name"], "Soap");
        assert!(clean.dropped_fields.is_empty());
    }

    #[test]
    fn test_non_keyed_record_is_rejected() {
        let err = Sanitizer::default()
            .sanitize(&RawValue::from(json!([1, 2])), EntityKind::Product)
            .unwrap_err();
        assert_eq!(err, Rejection::NotKeyed);
        assert_eq!(err.error_kind(), ErrorKind::MalformedRecords);
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let record = RawValue::from(json!({"name": "Soap", "cost": 1}));
        let err = Sanitizer::default()
            .sanitize(&record, EntityKind::Product)
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::MissingRequired {
                field: "price".to_string()
            }
        );
        assert_eq!(err.error_kind(), ErrorKind::MissingRequiredFields);
    }

    #[test]
    fn test_blank_required_text_is_rejected() {
        let err = Sanitizer::default()
            .sanitize(&product("   ", json!(1)), EntityKind::Product)
            .unwrap_err();
        assert!(matches!(err, Rejection::MissingRequired { ref field } if field == "name"));
    }

    #[test]
    fn test_numeric_string_is_parsed() {
        let clean = Sanitizer::default()
            .sanitize(&product("Soap", json!("3.25")), EntityKind::Product)
            .unwrap();
        assert_eq!(clean.fields["price"], json!(3.25));
        assert!(clean.coerced_fields.is_empty());
    }

    #[test]
    fn test_lenient_policy_zeroes_garbage() {
        let clean = Sanitizer::new(NumericPolicy::Lenient)
            .sanitize(&product("Soap", json!("two")), EntityKind::Product)
            .unwrap();
        assert_eq!(clean.fields["price"], json!(0));
        assert_eq!(clean.coerced_fields, vec!["price".to_string()]);
    }

    #[test]
    fn test_strict_policy_rejects_garbage() {
        let err = Sanitizer::new(NumericPolicy::Strict)
            .sanitize(&product("Soap", json!("two")), EntityKind::Product)
            .unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::InvalidNumericData);
    }

    #[test]
    fn test_self_referential_field_is_dropped() {
        let node = RawNode::new();
        node.insert("name", "Looping soap");
        node.insert("price", RawValue::from(json!(2)));
        node.insert("cost", RawValue::from(json!(1)));
        node.insert("self_ref", node.clone());

        let clean = Sanitizer::default()
            .sanitize(&RawValue::Node(node.clone()), EntityKind::Product)
            .unwrap();
        assert_eq!(clean.dropped_fields, vec!["self_ref".to_string()]);
        assert!(!clean.fields.contains_key("self_ref"));
        assert_eq!(clean.fields["name"], "Looping soap");
        node.clear();
    }

    #[test]
    fn test_callable_required_field_rejects_record() {
        let node = RawNode::new();
        node.insert("name", RawValue::Callable("getName".into()));
        node.insert("price", RawValue::from(json!(2)));
        node.insert("cost", RawValue::from(json!(1)));

        let err = Sanitizer::default()
            .sanitize(&RawValue::Node(node), EntityKind::Product)
            .unwrap_err();
        assert!(matches!(err, Rejection::DroppedRequired { ref field, .. } if field == "name"));
        assert_eq!(err.error_kind(), ErrorKind::MalformedRecords);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let record = product("Soap\u{0}", json!("2"));
        let before = record.to_json().unwrap();
        let _ = Sanitizer::default().sanitize(&record, EntityKind::Product);
        assert_eq!(record.to_json().unwrap(), before);
    }

    #[test]
    fn test_sanitize_all_reports_rejections_with_index() {
        let records = vec![
            product("A", json!(1)),
            product("B", json!(2)),
            RawValue::from(json!({"name": "C", "cost": 1})),
            product("D", json!(4)),
        ];
        let report = Sanitizer::default().sanitize_all(&records, EntityKind::Product);
        assert_eq!(report.total, 4);
        assert_eq!(report.accepted.len(), 3);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 2);
        assert_eq!(report.accepted[2]["name"], "D");
    }

    #[test]
    fn test_sanitize_batch_offsets_indices() {
        let records = vec![RawValue::from(json!("not a record"))];
        let report = Sanitizer::default().sanitize_batch(&records, EntityKind::Customer, 40);
        assert_eq!(report.rejected[0].index, 40);
    }
}
