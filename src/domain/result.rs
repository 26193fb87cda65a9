//! Result type alias for shopvault
//!
//! This module provides a convenient Result type alias that uses VaultError
//! as the error type.

use super::errors::VaultError;

/// Result type alias for shopvault operations
///
/// # Examples
///
/// ```
/// use shopvault::domain::result::Result;
/// use shopvault::domain::errors::VaultError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(VaultError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{ErrorKind, PipelineError};

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_pipeline_error_propagates_through_question_mark() {
        fn inner() -> Result<()> {
            Err(PipelineError::new(ErrorKind::EmptyDataType, "nothing to import"))?
        }

        let err = inner().unwrap_err();
        assert_eq!(err.typed_kind(), Some(ErrorKind::EmptyDataType));
    }
}
