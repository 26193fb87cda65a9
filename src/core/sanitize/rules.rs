//! Field-level cleanup rules
//!
//! Control character stripping and numeric coercion applied to every record
//! the sanitizer accepts.

use crate::domain::errors::VaultError;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

/// How unparseable values in numeric columns are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericPolicy {
    /// Coerce to `0` and count a coercion warning
    #[default]
    Lenient,
    /// Reject the record with `invalid_numeric_data`
    Strict,
}

impl FromStr for NumericPolicy {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(NumericPolicy::Lenient),
            "strict" => Ok(NumericPolicy::Strict),
            other => Err(VaultError::Validation(format!(
                "Invalid numeric policy '{other}'. Must be one of: lenient, strict"
            ))),
        }
    }
}

impl fmt::Display for NumericPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericPolicy::Lenient => write!(f, "lenient"),
            NumericPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Result of coercing a single numeric column
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// Value was already a number, or absent/null
    Unchanged,
    /// A numeric string was parsed
    Parsed(Value),
    /// The value could not be parsed; lenient fallback applied
    Zeroed,
    /// The value could not be parsed and the policy is strict
    Rejected,
}

/// Coerces a numeric column value according to `policy`
pub fn coerce_numeric(value: &Value, policy: NumericPolicy) -> Coercion {
    match value {
        Value::Number(_) | Value::Null => Coercion::Unchanged,
        Value::String(text) => match parse_number(text) {
            Some(number) => Coercion::Parsed(Value::Number(number)),
            None => unparseable(policy),
        },
        _ => unparseable(policy),
    }
}

fn unparseable(policy: NumericPolicy) -> Coercion {
    match policy {
        NumericPolicy::Lenient => Coercion::Zeroed,
        NumericPolicy::Strict => Coercion::Rejected,
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Number::from(integer));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|float| float.is_finite())
        .and_then(Number::from_f64)
}

/// Whether a character is stripped from string fields (0x00-0x1F, 0x7F)
pub fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}')
}

/// Returns a copy of `value` with control characters removed from every string
pub fn strip_control_chars(value: Value) -> Value {
    match value {
        Value::String(text) => {
            if text.chars().any(is_stripped_control) {
                Value::String(text.chars().filter(|c| !is_stripped_control(*c)).collect())
            } else {
                Value::String(text)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_control_chars).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, strip_control_chars(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!("12"), Coercion::Parsed(json!(12)); "integer string")]
    #[test_case(json!(" 4.5 "), Coercion::Parsed(json!(4.5)); "float string with spaces")]
    #[test_case(json!(3), Coercion::Unchanged; "already numeric")]
    #[test_case(json!(null), Coercion::Unchanged; "null")]
    #[test_case(json!("abc"), Coercion::Zeroed; "garbage")]
    #[test_case(json!("NaN"), Coercion::Zeroed; "not finite")]
    #[test_case(json!(true), Coercion::Zeroed; "boolean")]
    fn test_lenient_coercion(input: Value, expected: Coercion) {
        assert_eq!(coerce_numeric(&input, NumericPolicy::Lenient), expected);
    }

    #[test]
    fn test_strict_coercion_rejects() {
        assert_eq!(
            coerce_numeric(&json!("12,50"), NumericPolicy::Strict),
            Coercion::Rejected
        );
        assert_eq!(
            coerce_numeric(&json!("12.50"), NumericPolicy::Strict),
            Coercion::Parsed(json!(12.5))
        );
    }

    #[test]
    fn test_strip_control_chars_recurses() {
        let cleaned = strip_control_chars(json!({
            "name": "Tea\u{0}\u{7f}\tBags",
            "tags": ["a\u{1b}b"],
            "price": 2
        }));
        assert_eq!(cleaned["name"], "TeaBags");
        assert_eq!(cleaned["tags"][0], "ab");
        assert_eq!(cleaned["price"], 2);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Strict".parse::<NumericPolicy>().unwrap(), NumericPolicy::Strict);
        assert!("loose".parse::<NumericPolicy>().is_err());
        assert_eq!(NumericPolicy::default().to_string(), "lenient");
    }
}
