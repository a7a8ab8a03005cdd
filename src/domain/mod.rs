//! Domain types for ahd2fhir.
//!
//! - **Annotations** ([`Annotation`], [`AnnotationKind`]): typed view of what the
//!   text analysis service returns
//! - **Identifiers** ([`ResourceId`]): deterministic, hash-derived FHIR ids
//! - **Errors** ([`Ahd2FhirError`], [`AhdError`], [`MappingError`], [`ErrorKind`])
//! - **Result type alias** ([`Result`])

pub mod annotation;
pub mod errors;
pub mod ids;
pub mod result;

pub use annotation::{Annotation, AnnotationKind};
pub use errors::{Ahd2FhirError, AhdError, ErrorKind, MappingError};
pub use ids::ResourceId;
pub use result::Result;
