//! Loosely typed values handed over by the store collaborator
//!
//! The shop database hands records to the pipeline as dynamic values. Most of
//! them are plain JSON, but a record may also carry things that cannot be
//! serialized: callable handles, or shared nodes that end up referencing
//! themselves. [`RawValue::to_json`] performs the full-depth traversal that
//! tells the two apart.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Maximum nesting depth accepted when converting a raw value to JSON
pub const MAX_DEPTH: usize = 64;

/// Why a raw value could not be converted to JSON
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// A callable handle was found at `path`
    #[error("callable value '{name}' at {path} is not serializable")]
    Callable { name: String, path: String },

    /// A node references one of its own ancestors
    #[error("circular reference at {path}")]
    Circular { path: String },

    /// Nesting deeper than [`MAX_DEPTH`]
    #[error("structure nested deeper than {MAX_DEPTH} levels at {path}")]
    TooDeep { path: String },

    /// A node's lock was poisoned by a panicking writer
    #[error("shared node at {path} is poisoned")]
    Poisoned { path: String },
}

/// Shared, mutable keyed node; clones alias the same storage
#[derive(Debug, Clone, Default)]
pub struct RawNode(Arc<Mutex<BTreeMap<String, RawValue>>>);

impl RawNode {
    /// Creates an empty node
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, returning the previous value
    pub fn insert(&self, key: impl Into<String>, value: impl Into<RawValue>) -> Option<RawValue> {
        match self.0.lock() {
            Ok(mut fields) => fields.insert(key.into(), value.into()),
            Err(poisoned) => poisoned.into_inner().insert(key.into(), value.into()),
        }
    }

    /// Removes every field; breaks reference cycles so the node can be freed
    pub fn clear(&self) {
        match self.0.lock() {
            Ok(mut fields) => fields.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Snapshot of the field names, in key order
    pub fn keys(&self) -> Vec<String> {
        match self.0.lock() {
            Ok(fields) => fields.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    fn entries(&self, path: &str) -> Result<Vec<(String, RawValue)>, ConversionError> {
        let fields = self.0.lock().map_err(|_| ConversionError::Poisoned {
            path: path.to_string(),
        })?;
        Ok(fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

/// Dynamic value produced by the store
#[derive(Debug, Clone)]
pub enum RawValue {
    /// Plain, serializable JSON
    Json(Value),
    /// A callable handle (method, closure) identified by name
    Callable(String),
    /// Shared keyed node; may form cycles
    Node(RawNode),
    /// List of raw values
    List(Vec<RawValue>),
}

impl RawValue {
    /// Whether the value is a keyed structure (object or node)
    pub fn is_keyed(&self) -> bool {
        matches!(self, RawValue::Json(Value::Object(_)) | RawValue::Node(_))
    }

    /// Top-level fields of a keyed value, without converting them
    ///
    /// Returns `None` when the value is not keyed. The returned pairs are
    /// copies; the original value is never mutated.
    pub fn fields(&self) -> Option<Result<Vec<(String, RawValue)>, ConversionError>> {
        match self {
            RawValue::Json(Value::Object(map)) => Some(Ok(map
                .iter()
                .map(|(key, value)| (key.clone(), RawValue::Json(value.clone())))
                .collect())),
            RawValue::Node(node) => Some(node.entries("$")),
            _ => None,
        }
    }

    /// Top-level string field of a keyed value
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self {
            RawValue::Json(value) => value.get(key).and_then(Value::as_str).map(str::to_string),
            RawValue::Node(node) => match node.0.lock() {
                Ok(fields) => match fields.get(key) {
                    Some(RawValue::Json(Value::String(text))) => Some(text.clone()),
                    _ => None,
                },
                Err(_) => None,
            },
            _ => None,
        }
    }

    /// Converts the value to plain JSON, failing on callables and cycles
    pub fn to_json(&self) -> Result<Value, ConversionError> {
        let mut ancestors = Vec::new();
        self.to_json_at("$", 0, &mut ancestors)
    }

    /// Converts a field value whose parent node is `parent`
    ///
    /// The parent is treated as an ancestor, so a field pointing back at its
    /// own record is reported as circular.
    pub fn to_json_within(&self, parent: Option<&RawNode>, path: &str) -> Result<Value, ConversionError> {
        let mut ancestors: Vec<usize> = parent.map(|node| vec![node.addr()]).unwrap_or_default();
        self.to_json_at(path, 1, &mut ancestors)
    }

    fn to_json_at(
        &self,
        path: &str,
        depth: usize,
        ancestors: &mut Vec<usize>,
    ) -> Result<Value, ConversionError> {
        if depth > MAX_DEPTH {
            return Err(ConversionError::TooDeep {
                path: path.to_string(),
            });
        }

        match self {
            RawValue::Json(value) => {
                if json_depth(value) + depth > MAX_DEPTH {
                    return Err(ConversionError::TooDeep {
                        path: path.to_string(),
                    });
                }
                Ok(value.clone())
            }
            RawValue::Callable(name) => Err(ConversionError::Callable {
                name: name.clone(),
                path: path.to_string(),
            }),
            RawValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let child = format!("{path}[{index}]");
                    out.push(item.to_json_at(&child, depth + 1, ancestors)?);
                }
                Ok(Value::Array(out))
            }
            RawValue::Node(node) => {
                // Check before locking: a node on the path is already being read.
                let addr = node.addr();
                if ancestors.contains(&addr) {
                    return Err(ConversionError::Circular {
                        path: path.to_string(),
                    });
                }

                let entries = node.entries(path)?;
                ancestors.push(addr);
                let mut map = Map::new();
                for (key, value) in entries {
                    let child = format!("{path}.{key}");
                    match value.to_json_at(&child, depth + 1, ancestors) {
                        Ok(json) => {
                            map.insert(key, json);
                        }
                        Err(e) => {
                            ancestors.pop();
                            return Err(e);
                        }
                    }
                }
                ancestors.pop();
                Ok(Value::Object(map))
            }
        }
    }
}

fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        RawValue::Json(value)
    }
}

impl From<RawNode> for RawValue {
    fn from(node: RawNode) -> Self {
        RawValue::Node(node)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Json(Value::String(value.to_string()))
    }
}
