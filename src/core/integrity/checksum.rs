//! Checksum calculation for snapshot integrity
//!
//! Checksums are computed over the canonical JSON serialization of a value:
//! object keys sorted, no whitespace. Two algorithms are available. The
//! default `rolling32` is the small multiplicative hash older snapshots carry;
//! `sha256` is offered for operators who want a wider digest.

use crate::domain::errors::VaultError;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Checksum algorithm recorded in snapshot metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// `hash = hash * 31 + code_unit` over UTF-16, wrapped to 32 bits
    #[default]
    Rolling32,
    /// SHA-256, hex encoded
    Sha256,
}

impl ChecksumAlgorithm {
    /// Name written into snapshot metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Rolling32 => "rolling32",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = VaultError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rolling32" => Ok(ChecksumAlgorithm::Rolling32),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(VaultError::Validation(format!(
                "Unknown checksum algorithm '{other}'. Must be one of: rolling32, sha256"
            ))),
        }
    }
}

/// Calculates the checksum of a JSON value with the given algorithm
///
/// # Examples
///
/// ```
/// use shopvault::core::integrity::checksum::{calculate_checksum, ChecksumAlgorithm};
/// use serde_json::json;
///
/// let a = calculate_checksum(&json!({"b": 1, "a": 2}), ChecksumAlgorithm::Rolling32).unwrap();
/// let b = calculate_checksum(&json!({"a": 2, "b": 1}), ChecksumAlgorithm::Rolling32).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn calculate_checksum(data: &Value, algorithm: ChecksumAlgorithm) -> Result<String> {
    let canonical = canonical_json(data)?;
    Ok(match algorithm {
        ChecksumAlgorithm::Rolling32 => rolling32(&canonical),
        ChecksumAlgorithm::Sha256 => sha256_hex(canonical.as_bytes()),
    })
}

/// Serializes a value with sorted keys and no whitespace
pub fn canonical_json(data: &Value) -> Result<String> {
    let normalized = normalize_json(data);
    serde_json::to_string(&normalized).map_err(|e| VaultError::Serialization(e.to_string()))
}

/// Rolling multiplicative hash over UTF-16 code units
///
/// Wraps to a signed 32-bit value, takes the absolute value, hex encodes.
pub fn rolling32(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        });
    format!("{:x}", hash.unsigned_abs())
}

/// SHA-256 of raw bytes, hex encoded
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{result:x}")
}

/// Recursively sorts object keys so equal content serializes identically
fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rolling32_known_values() {
        assert_eq!(rolling32(""), "0");
        // 'a' = 97
        assert_eq!(rolling32("a"), "61");
        // 97 * 31 + 98 = 3105
        assert_eq!(rolling32("ab"), "c21");
    }

    #[test]
    fn test_rolling32_wraps_and_takes_absolute_value() {
        let long = "z".repeat(64);
        let checksum = rolling32(&long);
        assert!(checksum.len() <= 8);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_rolling32_uses_utf16_code_units() {
        // U+1F600 is a surrogate pair, so two code units are folded in
        let emoji = rolling32("\u{1F600}");
        let expected = (0xD83Di32).wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(emoji, format!("{:x}", expected.unsigned_abs()));
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let data = json!({"products": [{"name": "Soap", "price": 2.5}]});
        for algorithm in [ChecksumAlgorithm::Rolling32, ChecksumAlgorithm::Sha256] {
            let first = calculate_checksum(&data, algorithm).unwrap();
            let second = calculate_checksum(&data, algorithm).unwrap();
            assert_eq!(first, second);
        }
        assert_eq!(
            calculate_checksum(&data, ChecksumAlgorithm::Sha256).unwrap().len(),
            64
        );
    }

    #[test]
    fn test_checksum_key_order_independence() {
        let data1 = json!({"a": 1, "b": {"y": 2, "x": 3}});
        let data2 = json!({"b": {"x": 3, "y": 2}, "a": 1});
        assert_eq!(
            calculate_checksum(&data1, ChecksumAlgorithm::Rolling32).unwrap(),
            calculate_checksum(&data2, ChecksumAlgorithm::Rolling32).unwrap()
        );
    }

    #[test]
    fn test_checksum_is_order_dependent_within_arrays() {
        let data1 = json!({"items": [1, 2]});
        let data2 = json!({"items": [2, 1]});
        assert_ne!(
            calculate_checksum(&data1, ChecksumAlgorithm::Rolling32).unwrap(),
            calculate_checksum(&data2, ChecksumAlgorithm::Rolling32).unwrap()
        );
    }

    #[test]
    fn test_canonical_json_is_compact_and_sorted() {
        let canonical = canonical_json(&json!({"b": 1, "a": [true, null]})).unwrap();
        assert_eq!(canonical, r#"{"a":[true,null],"b":1}"#);
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(
            "SHA256".parse::<ChecksumAlgorithm>().unwrap(),
            ChecksumAlgorithm::Sha256
        );
        assert!("md5".parse::<ChecksumAlgorithm>().is_err());
        assert_eq!(
            serde_json::to_string(&ChecksumAlgorithm::Rolling32).unwrap(),
            "\"rolling32\""
        );
    }
}
