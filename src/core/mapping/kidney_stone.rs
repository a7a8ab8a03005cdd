//! Kidney stone findings from imaging reports to `Observation`s
//!
//! The finding itself becomes one observation. When the report states the stone
//! size, length and width become child observations linked via `hasMember`.

use super::common::{
    deterministic_identifier, document_identifier_value, now_timestamp, MappingSettings,
};
use super::smoking_status::OBSERVATION_CATEGORY_SYSTEM;
use super::{unexpected, Mapper};
use crate::domain::annotation::KidneyStoneAnnotation;
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{
    CodeableConcept, Coding, DocumentReference, Meta, Observation, Quantity, Reference, Resource,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum StoneDimension {
    Length,
    Width,
}

impl StoneDimension {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Width => "width",
        }
    }

    fn loinc(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Length => ("9799-8", "Length (Stone) [Length]", "Length of Stone"),
            Self::Width => ("9805-3", "Width (Stone) [Length]", "Width of Stone"),
        }
    }
}

pub struct KidneyStoneMapper {
    settings: Arc<MappingSettings>,
}

impl KidneyStoneMapper {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self { settings }
    }

    fn build(
        &self,
        annotation: &KidneyStoneAnnotation,
        doc: &DocumentReference,
    ) -> Vec<Observation> {
        let snomed = &self.settings.systems.snomed_ct;

        let (identifier, id) = deterministic_identifier(
            self.settings
                .annotation_identifier_system(AnnotationKind::KidneyStone.type_name()),
            format!(
                "{}_{}-{}",
                document_identifier_value(doc),
                annotation.span.begin.unwrap_or_default(),
                annotation.span.end.unwrap_or_default()
            ),
        );

        let mut finding = Observation {
            id,
            meta: Some(Meta::with_profile(&self.settings.profiles.observation)),
            identifier: vec![identifier],
            status: "final".to_string(),
            category: vec![CodeableConcept::from_coding(Coding::new(
                OBSERVATION_CATEGORY_SYSTEM,
                "imaging",
                "Imaging",
            ))],
            code: Some(
                CodeableConcept::from_coding(Coding {
                    user_selected: Some(false),
                    ..Coding::new(snomed, "95570007", "Kidney stone (disorder)")
                })
                .with_text("Kidney stone"),
            ),
            subject: doc.subject.clone(),
            encounter: doc.first_encounter().cloned(),
            effective_date_time: Some(doc.date.clone().unwrap_or_else(now_timestamp)),
            method: Some(CodeableConcept::from_coding(Coding::new(
                snomed,
                "363680008",
                "Radiographic imaging procedure",
            ))),
            value_codeable_concept: Some(
                CodeableConcept::from_coding(Coding {
                    system: Some(snomed.clone()),
                    code: Some("56381008".to_string()),
                    ..Default::default()
                })
                .with_text("Calculus (morphologic abnormality)"),
            ),
            ..Default::default()
        };

        let Some(size) = &annotation.size else {
            return vec![finding];
        };
        let Some(length) = size.value1 else {
            tracing::warn!(
                annotation_id = ?annotation.span.id,
                "Kidney stone size without a length"
            );
            return vec![finding];
        };
        // a width of 0 means the stone was described by a single dimension
        let width = size.value2.filter(|w| *w != 0.0).unwrap_or(length);
        let unit = size.unit.as_ref().and_then(|u| u.covered_text.clone());

        let children = [
            self.dimension(&finding, StoneDimension::Length, length, unit.clone()),
            self.dimension(&finding, StoneDimension::Width, width, unit),
        ];

        finding.has_member = children
            .iter()
            .map(|child| Reference {
                display: child
                    .code
                    .as_ref()
                    .and_then(|c| c.coding.first())
                    .and_then(|c| c.display.clone()),
                ..Reference::to("Observation", &child.id)
            })
            .collect();

        let mut observations = vec![finding];
        observations.extend(children);
        observations
    }

    fn dimension(
        &self,
        parent: &Observation,
        dimension: StoneDimension,
        value: f64,
        unit: Option<String>,
    ) -> Observation {
        let (code, display, name) = dimension.loinc();
        let parent_identifier = parent.identifier.first().cloned().unwrap_or_default();

        let (identifier, id) = deterministic_identifier(
            parent_identifier.system.unwrap_or_default(),
            format!(
                "{}_{}",
                parent_identifier.value.unwrap_or_default(),
                dimension.suffix()
            ),
        );

        Observation {
            id,
            meta: parent.meta.clone(),
            identifier: vec![identifier],
            status: "final".to_string(),
            code: Some(
                CodeableConcept::from_coding(Coding {
                    user_selected: Some(false),
                    ..Coding::new(&self.settings.systems.loinc, code, display)
                })
                .with_text(name),
            ),
            subject: parent.subject.clone(),
            encounter: parent.encounter.clone(),
            effective_date_time: parent.effective_date_time.clone(),
            value_quantity: Some(Quantity {
                value: Some(value),
                code: unit.clone(),
                unit,
                system: Some(self.settings.systems.ucum.clone()),
            }),
            ..Default::default()
        }
    }
}

impl Mapper for KidneyStoneMapper {
    fn name(&self) -> &'static str {
        "kidney_stone"
    }

    fn annotation_kind(&self) -> AnnotationKind {
        AnnotationKind::KidneyStone
    }

    fn map(
        &self,
        annotation: &Annotation,
        doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError> {
        let Annotation::KidneyStone(stone) = annotation else {
            return Err(unexpected(self.name(), annotation));
        };

        Ok(self
            .build(stone, doc)
            .into_iter()
            .map(Resource::Observation)
            .collect())
    }
}
