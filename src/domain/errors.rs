//! Domain error types
//!
//! This module defines the error hierarchy for shopvault. Failures inside the
//! snapshot pipeline are raised as [`PipelineError`] values that carry an
//! explicit [`ErrorKind`] from the point of failure, so recovery never has to
//! guess the class of a problem from its message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main shopvault error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Typed snapshot pipeline failure
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Untyped failure reported by a store collaborator
    #[error("Store error: {0}")]
    Store(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        /// Original I/O error kind, kept for classification
        kind: std::io::ErrorKind,
        /// Error message
        message: String,
    },

    /// Operation stopped by the cancellation flag between batches
    #[error("Operation cancelled during {stage}")]
    Cancelled {
        /// Stage that observed the cancellation
        stage: String,
    },

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl VaultError {
    /// Returns the error kind carried by a typed error, if any
    pub fn typed_kind(&self) -> Option<ErrorKind> {
        match self {
            VaultError::Pipeline(e) => Some(e.kind),
            VaultError::Io { kind, .. } => match kind {
                std::io::ErrorKind::NotFound => Some(ErrorKind::FileNotFound),
                std::io::ErrorKind::OutOfMemory => Some(ErrorKind::MemoryLimitExceeded),
                std::io::ErrorKind::InvalidData => Some(ErrorKind::FileCorrupted),
                _ => None,
            },
            _ => None,
        }
    }

    /// Human-readable message suitable for showing to the operator
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Pipeline(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Closed taxonomy of pipeline failures
///
/// Every kind maps to exactly one recovery strategy, see
/// [`crate::core::recovery::RecoveryPolicies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotFound,
    InvalidFileFormat,
    FileCorrupted,
    InvalidDataStructure,
    MissingRequiredFields,
    DataTypeMismatch,
    EmptyDataType,
    MissingDataType,
    CorruptedDataSection,
    MalformedRecords,
    CircularReference,
    InvalidNumericData,
    ConstraintViolation,
    ReferenceIntegrityError,
    TransactionFailed,
    MemoryLimitExceeded,
    StorageSpaceInsufficient,
    NetworkError,
    Unknown,
}

/// Coarse grouping of error kinds used for propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// File could not be found, parsed, or trusted
    File,
    /// Data inside a readable file is wrong
    Data,
    /// The store refused a write
    Store,
    /// The device ran out of something
    Resource,
    /// Unclassified
    Unknown,
}

impl ErrorKind {
    /// All kinds in declaration order
    pub const ALL: [ErrorKind; 19] = [
        ErrorKind::FileNotFound,
        ErrorKind::InvalidFileFormat,
        ErrorKind::FileCorrupted,
        ErrorKind::InvalidDataStructure,
        ErrorKind::MissingRequiredFields,
        ErrorKind::DataTypeMismatch,
        ErrorKind::EmptyDataType,
        ErrorKind::MissingDataType,
        ErrorKind::CorruptedDataSection,
        ErrorKind::MalformedRecords,
        ErrorKind::CircularReference,
        ErrorKind::InvalidNumericData,
        ErrorKind::ConstraintViolation,
        ErrorKind::ReferenceIntegrityError,
        ErrorKind::TransactionFailed,
        ErrorKind::MemoryLimitExceeded,
        ErrorKind::StorageSpaceInsufficient,
        ErrorKind::NetworkError,
        ErrorKind::Unknown,
    ];

    /// Stable snake_case name, as written in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::InvalidFileFormat => "invalid_file_format",
            ErrorKind::FileCorrupted => "file_corrupted",
            ErrorKind::InvalidDataStructure => "invalid_data_structure",
            ErrorKind::MissingRequiredFields => "missing_required_fields",
            ErrorKind::DataTypeMismatch => "data_type_mismatch",
            ErrorKind::EmptyDataType => "empty_data_type",
            ErrorKind::MissingDataType => "missing_data_type",
            ErrorKind::CorruptedDataSection => "corrupted_data_section",
            ErrorKind::MalformedRecords => "malformed_records",
            ErrorKind::CircularReference => "circular_reference",
            ErrorKind::InvalidNumericData => "invalid_numeric_data",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::ReferenceIntegrityError => "reference_integrity_error",
            ErrorKind::TransactionFailed => "transaction_failed",
            ErrorKind::MemoryLimitExceeded => "memory_limit_exceeded",
            ErrorKind::StorageSpaceInsufficient => "storage_space_insufficient",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Category this kind belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::FileNotFound | ErrorKind::InvalidFileFormat | ErrorKind::FileCorrupted => {
                ErrorCategory::File
            }
            ErrorKind::InvalidDataStructure
            | ErrorKind::MissingRequiredFields
            | ErrorKind::DataTypeMismatch
            | ErrorKind::EmptyDataType
            | ErrorKind::MissingDataType
            | ErrorKind::CorruptedDataSection
            | ErrorKind::MalformedRecords
            | ErrorKind::CircularReference
            | ErrorKind::InvalidNumericData => ErrorCategory::Data,
            ErrorKind::ConstraintViolation
            | ErrorKind::ReferenceIntegrityError
            | ErrorKind::TransactionFailed => ErrorCategory::Store,
            ErrorKind::MemoryLimitExceeded
            | ErrorKind::StorageSpaceInsufficient
            | ErrorKind::NetworkError => ErrorCategory::Resource,
            ErrorKind::Unknown => ErrorCategory::Unknown,
        }
    }

    /// Whether the kind describes a single record rather than the whole operation
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            ErrorKind::MissingRequiredFields
                | ErrorKind::MalformedRecords
                | ErrorKind::CircularReference
                | ErrorKind::InvalidNumericData
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed pipeline failure
///
/// Carries enough context to build an actionable message: what the caller
/// selected, what was actually found, and how to fix it.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    /// Classification assigned at the point of failure
    pub kind: ErrorKind,

    /// What went wrong
    pub message: String,

    /// What the caller asked for (data type, path, ...)
    pub selected: Option<String>,

    /// What was actually found
    pub found: Vec<String>,

    /// Concrete remediation hint
    pub hint: Option<String>,
}

impl PipelineError {
    /// Creates a new pipeline error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            selected: None,
            found: Vec::new(),
            hint: None,
        }
    }

    /// Sets what the caller selected
    pub fn with_selected(mut self, selected: impl Into<String>) -> Self {
        self.selected = Some(selected.into());
        self
    }

    /// Sets what was found instead
    pub fn with_found<I, S>(mut self, found: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.found = found.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the remediation hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Builds the operator-facing message
    pub fn user_message(&self) -> String {
        let mut message = self.message.clone();
        if let Some(selected) = &self.selected {
            message.push_str(&format!(". Selected: {selected}"));
        }
        if !self.found.is_empty() {
            message.push_str(&format!(". Found: [{}]", self.found.join(", ")));
        }
        if let Some(hint) = &self.hint {
            message.push_str(&format!(". {hint}"));
        }
        message
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for VaultError {
    fn from(err: toml::de::Error) -> Self {
        VaultError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_error_display() {
        let err = VaultError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_pipeline_error_conversion_keeps_kind() {
        let err: VaultError = PipelineError::new(ErrorKind::FileCorrupted, "bad checksum").into();
        assert_eq!(err.typed_kind(), Some(ErrorKind::FileCorrupted));
        assert_eq!(err.to_string(), "file_corrupted: bad checksum");
    }

    #[test]
    fn test_io_not_found_is_typed() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VaultError = io_err.into();
        assert!(matches!(err, VaultError::Io { .. }));
        assert_eq!(err.typed_kind(), Some(ErrorKind::FileNotFound));
    }

    #[test]
    fn test_untyped_errors_have_no_kind() {
        let err = VaultError::Store("UNIQUE constraint failed".to_string());
        assert_eq!(err.typed_kind(), None);
    }

    #[test]
    fn test_user_message_includes_selection_and_hint() {
        let err = PipelineError::new(ErrorKind::MissingDataType, "Requested data not in file")
            .with_selected("customers")
            .with_found(["sales"])
            .with_hint("Select one of: sales");
        let message = err.user_message();
        assert!(message.contains("Selected: customers"));
        assert!(message.contains("Found: [sales]"));
        assert!(message.ends_with("Select one of: sales"));
    }

    #[test]
    fn test_error_kind_names_are_snake_case() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_record_level_kinds() {
        assert!(ErrorKind::CircularReference.is_record_level());
        assert!(!ErrorKind::FileCorrupted.is_record_level());
        assert_eq!(ErrorKind::NetworkError.category(), ErrorCategory::Resource);
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: VaultError = toml_err.into();
        assert!(matches!(err, VaultError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
