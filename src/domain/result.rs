//! Result type alias for Strand
//!
//! This module provides a convenient Result type alias that uses StrandError
//! as the error type.

use super::errors::StrandError;

/// Result type alias for Strand operations
///
/// # Examples
///
/// ```
/// use strand::domain::result::Result;
/// use strand::domain::errors::StrandError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(StrandError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, StrandError>;
