//! Result type alias for ahd2fhir

use super::errors::Ahd2FhirError;

/// Result type alias for ahd2fhir operations
///
/// # Examples
///
/// ```
/// use ahd2fhir::domain::result::Result;
/// use ahd2fhir::domain::errors::Ahd2FhirError;
///
/// fn reject() -> Result<()> {
///     Err(Ahd2FhirError::InvalidInput("no attachment".to_string()))
/// }
/// assert!(reject().is_err());
/// ```
pub type Result<T> = std::result::Result<T, Ahd2FhirError>;
