//! Smoking status annotations to a LOINC 72166-2 `Observation`

use super::common::{
    deterministic_identifier, document_identifier_value, now_timestamp, MappingSettings,
};
use super::{unexpected, Mapper};
use crate::domain::annotation::SmokingStatusAnnotation;
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{CodeableConcept, Coding, DocumentReference, Meta, Observation, Resource};
use std::sync::Arc;

pub(crate) const OBSERVATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

/// LOINC answer code and display for a smoking status
fn loinc_answer(status: &str) -> Option<(&'static str, &'static str)> {
    match status {
        "PAST-SMOKER" | "CURRENT-NON-SMOKER" => Some(("LA15920-4", "Former smoker")),
        "CURRENT-SMOKER" => Some(("LA18976-3", "Current every day smoker")),
        "NEVER-SMOKER" => Some(("LA18978-9", "Never smoker")),
        "CURRENT-OR-PAST-SMOKER" => Some(("LA18979-7", "Smoker, current status unknown")),
        // the annotator has emitted both spellings
        "UNKNOWN" | "UNKNOW" => Some(("LA18980-5", "Unknown if ever smoked")),
        _ => None,
    }
}

pub struct SmokingStatusMapper {
    settings: Arc<MappingSettings>,
}

impl SmokingStatusMapper {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self { settings }
    }

    fn build(
        &self,
        annotation: &SmokingStatusAnnotation,
        doc: &DocumentReference,
    ) -> Option<Observation> {
        let status = annotation.smoking_status.as_deref().unwrap_or_default();
        let Some((answer_code, answer_text)) = loinc_answer(status) else {
            tracing::warn!(
                smoking_status = %status,
                "Unmapped smoking status, ignoring annotation"
            );
            return None;
        };

        let systems = &self.settings.systems;

        let (identifier, id) = deterministic_identifier(
            self.settings
                .annotation_identifier_system(AnnotationKind::SmokingStatus.type_name()),
            format!(
                "{}_{}-{}",
                document_identifier_value(doc),
                annotation.span.begin.unwrap_or_default(),
                annotation.span.end.unwrap_or_default()
            ),
        );

        let mut observation = Observation {
            id,
            meta: Some(Meta::with_profile(&self.settings.profiles.observation)),
            identifier: vec![identifier],
            status: "final".to_string(),
            category: vec![CodeableConcept::from_coding(Coding::new(
                OBSERVATION_CATEGORY_SYSTEM,
                "social-history",
                "Social History",
            ))],
            code: Some(
                CodeableConcept::from_coding(Coding {
                    user_selected: Some(false),
                    ..Coding::new(&systems.loinc, "72166-2", "Tobacco smoking status")
                })
                .with_text("Tobacco smoking status"),
            ),
            subject: doc.subject.clone(),
            encounter: doc.first_encounter().cloned(),
            effective_date_time: Some(doc.date.clone().unwrap_or_else(now_timestamp)),
            ..Default::default()
        };

        if self.settings.smoking_status_as_value_string {
            observation.value_string = Some(answer_text.to_string());
        } else {
            let mut coding = vec![Coding {
                system: Some(systems.loinc.clone()),
                code: Some(answer_code.to_string()),
                ..Default::default()
            }];
            if let Some(sctid) = &annotation.sctid {
                coding.push(Coding {
                    system: Some(systems.snomed_ct.clone()),
                    code: Some(sctid.clone()),
                    ..Default::default()
                });
            }
            observation.value_codeable_concept = Some(CodeableConcept {
                coding,
                text: Some(answer_text.to_string()),
            });
        }

        Some(observation)
    }
}

impl Mapper for SmokingStatusMapper {
    fn name(&self) -> &'static str {
        "smoking_status"
    }

    fn annotation_kind(&self) -> AnnotationKind {
        AnnotationKind::SmokingStatus
    }

    fn map(
        &self,
        annotation: &Annotation,
        doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError> {
        let Annotation::SmokingStatus(smoking) = annotation else {
            return Err(unexpected(self.name(), annotation));
        };

        Ok(self
            .build(smoking, doc)
            .map(Resource::Observation)
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::SMOKING_STATUS_TYPE;
    use serde_json::json;
    use test_case::test_case;

    fn observation(settings: MappingSettings, status: &str) -> Option<Observation> {
        let annotation = Annotation::from_value(json!({
            "type": SMOKING_STATUS_TYPE,
            "begin": 3,
            "end": 15,
            "smokingStatus": status,
            "sctid": 8517006
        }));
        let doc = DocumentReference {
            id: Some("doc-1".to_string()),
            date: Some("2021-03-04".to_string()),
            ..Default::default()
        };
        SmokingStatusMapper::new(Arc::new(settings))
            .map(&annotation, &doc)
            .unwrap()
            .pop()
            .map(|r| match r {
                Resource::Observation(o) => o,
                other => panic!("unexpected resource {other:?}"),
            })
    }

    #[test_case("PAST-SMOKER" => Some("LA15920-4"); "past")]
    #[test_case("CURRENT-NON-SMOKER" => Some("LA15920-4"); "current non smoker")]
    #[test_case("CURRENT-SMOKER" => Some("LA18976-3"); "current")]
    #[test_case("NEVER-SMOKER" => Some("LA18978-9"); "never")]
    #[test_case("CURRENT-OR-PAST-SMOKER" => Some("LA18979-7"); "current or past")]
    #[test_case("UNKNOW" => Some("LA18980-5"); "unknown misspelled")]
    #[test_case("UNKNOWN" => Some("LA18980-5"); "unknown")]
    #[test_case("HEAVY-SMOKER" => None; "unmapped")]
    fn test_loinc_answer(status: &str) -> Option<&'static str> {
        loinc_answer(status).map(|(code, _)| code)
    }

    #[test]
    fn test_value_codeable_concept_carries_loinc_and_snomed() {
        let observation = observation(MappingSettings::default(), "PAST-SMOKER").unwrap();
        let value = observation.value_codeable_concept.unwrap();
        assert_eq!(value.text.as_deref(), Some("Former smoker"));
        assert_eq!(value.coding[0].code.as_deref(), Some("LA15920-4"));
        assert_eq!(value.coding[1].code.as_deref(), Some("8517006"));
        assert_eq!(value.coding[1].system.as_deref(), Some("http://snomed.info/sct"));
        assert!(observation.value_string.is_none());
        assert_eq!(observation.effective_date_time.as_deref(), Some("2021-03-04"));
        assert_eq!(observation.identifier[0].value.as_deref(), Some("doc-1_3-15"));
        assert_eq!(observation.category[0].coding[0].code.as_deref(), Some("social-history"));
    }

    #[test]
    fn test_value_string_when_configured() {
        let settings = MappingSettings {
            smoking_status_as_value_string: true,
            ..Default::default()
        };
        let observation = observation(settings, "NEVER-SMOKER").unwrap();
        assert_eq!(observation.value_string.as_deref(), Some("Never smoker"));
        assert!(observation.value_codeable_concept.is_none());
    }

    #[test]
    fn test_unmapped_status_is_dropped() {
        assert!(observation(MappingSettings::default(), "HEAVY-SMOKER").is_none());
    }
}
