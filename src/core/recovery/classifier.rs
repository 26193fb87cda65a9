//! Error classification
//!
//! Typed errors carry their kind from the point of failure and are classified
//! directly. Untyped errors (foreign store errors, plain I/O, serde) fall back
//! to an ordered rule table over the lowercased message; the first rule with
//! a matching needle wins.

use crate::domain::errors::{ErrorKind, VaultError};

/// Ordered fallback rules: file problems before data problems
const MESSAGE_RULES: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::FileNotFound,
        &["no such file", "file not found", "enoent", "does not exist"],
    ),
    (
        ErrorKind::StorageSpaceInsufficient,
        &["no space left", "disk full", "storage full", "quota exceeded", "enospc"],
    ),
    (
        ErrorKind::MemoryLimitExceeded,
        &["out of memory", "memory limit", "allocation failed"],
    ),
    (
        ErrorKind::FileCorrupted,
        &["corrupt", "checksum mismatch"],
    ),
    (
        ErrorKind::InvalidFileFormat,
        &[
            "eof while parsing",
            "expected value",
            "trailing characters",
            "key must be a string",
            "invalid json",
        ],
    ),
    (
        ErrorKind::CircularReference,
        &["circular", "cyclic"],
    ),
    (
        ErrorKind::ReferenceIntegrityError,
        &["foreign key", "dangling reference", "reference integrity"],
    ),
    (
        ErrorKind::ConstraintViolation,
        &["constraint", "unique", "duplicate key"],
    ),
    (
        ErrorKind::TransactionFailed,
        &["transaction", "deadlock", "database is locked"],
    ),
    (
        ErrorKind::NetworkError,
        &["network", "connection refused", "connection reset", "timed out"],
    ),
    (
        ErrorKind::InvalidNumericData,
        &["not a number", "invalid numeric", "invalid number"],
    ),
    (
        ErrorKind::MissingRequiredFields,
        &["missing required", "required field"],
    ),
    (ErrorKind::MalformedRecords, &["malformed"]),
    (
        ErrorKind::InvalidDataStructure,
        &["invalid type", "invalid structure", "invalid data", "missing field"],
    ),
];

/// Classifies a failure into exactly one error kind
pub fn classify(error: &VaultError) -> ErrorKind {
    if let Some(kind) = error.typed_kind() {
        return kind;
    }
    classify_message(&error.to_string())
}

/// Classifies free-form error text with the ordered rule table
pub fn classify_message(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    MESSAGE_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| lowered.contains(needle)))
        .map_or(ErrorKind::Unknown, |(kind, _)| *kind)
}
