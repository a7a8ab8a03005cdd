//! Annotation to FHIR mapping
//!
//! Each [`Mapper`] turns annotations of one kind into FHIR resources. The
//! [`MapperRegistry`] holds the enabled mappers in a fixed order and the
//! [`MapperHandler`] drives them over the annotations of one document.
//!
//! Mappers never fail a document: annotations that cannot be mapped (negated,
//! family history, unknown code system, missing code) are logged and skipped.
//! A [`MappingError`] is reserved for annotations that break a mapper's
//! assumptions, and the handler isolates those per annotation.

pub mod common;
pub mod condition;
pub mod device;
pub mod kidney_stone;
pub mod medication;
pub mod medication_list;
pub mod medication_statement;
pub mod registry;
pub mod smoking_status;

pub use common::{dedup_by_id, MappingSettings};
pub use registry::{MapperHandler, MapperRegistry};

use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{DocumentReference, Resource};

/// Names accepted in `mapping.enabled_mappers`
pub const MAPPER_NAMES: [&str; 6] = [
    "condition",
    "medication",
    "medication_list",
    "device",
    "smoking_status",
    "kidney_stone",
];

/// Mappers enabled when the configuration does not name any
pub const DEFAULT_MAPPERS: [&str; 4] = ["condition", "medication", "medication_list", "device"];

/// Converts annotations of one kind into FHIR resources
pub trait Mapper: Send + Sync {
    /// Name used in `mapping.enabled_mappers`
    fn name(&self) -> &'static str;

    /// Kind of annotation this mapper consumes
    fn annotation_kind(&self) -> AnnotationKind;

    /// Whether the mapper wants the whole annotation list in one call
    ///
    /// When `true` the handler calls [`Mapper::map_all`] once per document
    /// instead of [`Mapper::map`] once per matching annotation.
    fn handles_all_annotations(&self) -> bool {
        false
    }

    /// Maps a single annotation of [`Mapper::annotation_kind`]
    ///
    /// An empty vector means the annotation was dropped.
    fn map(
        &self,
        annotation: &Annotation,
        doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError>;

    /// Maps all annotations of a document at once
    ///
    /// A failure on one annotation is handed to `on_failure` and mapping goes on
    /// with the next one. An `Err` discards the whole output of the call.
    fn map_all(
        &self,
        _annotations: &[Annotation],
        _doc: &DocumentReference,
        _on_failure: &mut dyn FnMut(&Annotation, MappingError),
    ) -> Result<Vec<Resource>, MappingError> {
        Ok(Vec::new())
    }

    /// Collapses the resources this mapper produced for one document
    fn deduplicate(&self, resources: Vec<Resource>) -> Vec<Resource> {
        resources
    }
}

/// Error for an annotation handed to the wrong mapper
pub(crate) fn unexpected(mapper: &'static str, annotation: &Annotation) -> MappingError {
    MappingError::UnexpectedAnnotation {
        mapper,
        actual: annotation.type_name().to_string(),
    }
}
