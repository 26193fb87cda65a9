//! Domain models and types for shopvault.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Entity kinds and scopes** ([`EntityKind`], [`DataTypeSelector`])
//! - **Raw store values** ([`RawValue`], [`RawNode`]) as they arrive from the shop database
//! - **Error types** ([`VaultError`], [`PipelineError`], [`ErrorKind`])
//! - **Result type alias** ([`Result`])
//! - **Time source** ([`Clock`])
//!
//! # Error Handling
//!
//! Pipeline failures are typed at the point they happen:
//!
//! ```rust
//! use shopvault::domain::{ErrorKind, PipelineError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(PipelineError::new(ErrorKind::EmptyDataType, "no customers in file")
//!         .with_selected("customers")
//!         .with_hint("Export customers first"))?
//! }
//! ```

pub mod clock;
pub mod entity;
pub mod errors;
pub mod raw;
pub mod result;

// Re-export commonly used types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::{DataTypeSelector, EntityKind, EntitySchema, FieldType, NUMERIC_COLUMNS};
pub use errors::{ErrorCategory, ErrorKind, PipelineError, VaultError};
pub use raw::{ConversionError, RawNode, RawValue};
pub use result::Result;
