//! Diagnosis annotations to `Condition`

use super::common::{
    deterministic_identifier, document_identifier_value, now_timestamp,
    positional_identifier_value, MappingSettings,
};
use super::{unexpected, Mapper};
use crate::domain::annotation::DiagnosisAnnotation;
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{CodeableConcept, Coding, Condition, DocumentReference, Meta, Resource};
use regex::Regex;
use std::sync::{Arc, OnceLock};

const FALLBACK_ICD_VERSION: &str = "2020";

fn icd_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ICD.*_(?P<version>\d{4})").unwrap())
}

/// Maps `de.averbis.types.health.Diagnosis` to ICD-10-GM coded conditions
pub struct ConditionMapper {
    settings: Arc<MappingSettings>,
}

impl ConditionMapper {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self { settings }
    }

    fn build(
        &self,
        diagnosis: &DiagnosisAnnotation,
        doc: &DocumentReference,
    ) -> Option<Condition> {
        if matches!(diagnosis.belongs_to.as_deref(), Some("FAMILY" | "OTHER")) {
            crate::log_annotation_dropped!(
                "condition",
                diagnosis.span.id,
                "refers to family history"
            );
            return None;
        }

        if diagnosis.negated_by.as_ref().is_some_and(|v| !v.is_null()) {
            crate::log_annotation_dropped!("condition", diagnosis.span.id, "negated");
            return None;
        }

        let source = diagnosis.source.as_deref().unwrap_or_default();
        if !source.contains("ICD10GM") {
            tracing::warn!(source = %source, "Unknown coding source, ignoring diagnosis");
            return None;
        }

        let Some(code) = diagnosis
            .concept_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            crate::log_annotation_dropped!("condition", diagnosis.span.id, "no ICD-10-GM code");
            return None;
        };

        let systems = &self.settings.systems;

        let coding = Coding {
            system: Some(systems.icd_10_gm.clone()),
            version: Some(icd_version(source)),
            code: Some(code.to_string()),
            display: diagnosis.dict_canon.clone(),
            user_selected: Some(false),
        };

        let (identifier, id) = deterministic_identifier(
            self.settings.annotation_identifier_system(AnnotationKind::Diagnosis.type_name()),
            positional_identifier_value(
                &document_identifier_value(doc),
                &diagnosis.span,
                diagnosis.unique_id.as_deref(),
            ),
        );

        let clinical_status = diagnosis
            .clinical_status
            .as_deref()
            .and_then(clinical_status_code)
            .map(|code| {
                CodeableConcept::from_coding(Coding {
                    system: Some(systems.condition_clinical_status.clone()),
                    code: Some(code.to_string()),
                    ..Default::default()
                })
            });

        let body_site = match diagnosis.side.as_deref() {
            None => Vec::new(),
            Some(side) => match side_code(side) {
                Some((code, display)) => vec![CodeableConcept::from_coding(Coding::new(
                    &systems.snomed_ct,
                    code,
                    display,
                ))],
                None => {
                    tracing::warn!(side = %side, "Could not map body side to a SNOMED concept");
                    Vec::new()
                }
            },
        };

        Some(Condition {
            id,
            meta: Some(Meta::with_profile(&self.settings.profiles.condition)),
            identifier: vec![identifier],
            clinical_status,
            code: Some(CodeableConcept::from_coding(coding)),
            body_site,
            subject: doc.subject.clone(),
            encounter: doc.first_encounter().cloned(),
            recorded_date: Some(doc.date.clone().unwrap_or_else(now_timestamp)),
        })
    }
}

impl Mapper for ConditionMapper {
    fn name(&self) -> &'static str {
        "condition"
    }

    fn annotation_kind(&self) -> AnnotationKind {
        AnnotationKind::Diagnosis
    }

    fn map(
        &self,
        annotation: &Annotation,
        doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError> {
        let Annotation::Diagnosis(diagnosis) = annotation else {
            return Err(unexpected(self.name(), annotation));
        };

        Ok(self
            .build(diagnosis, doc)
            .map(Resource::Condition)
            .into_iter()
            .collect())
    }
}

/// Year of the ICD-10-GM release named in the source, e.g. `ICD10GM_2021` gives `2021`
fn icd_version(source: &str) -> String {
    match icd_version_regex().captures(source) {
        Some(caps) => caps["version"].to_string(),
        None => {
            tracing::warn!(
                source = %source,
                fallback = FALLBACK_ICD_VERSION,
                "Could not extract version from ICD source"
            );
            FALLBACK_ICD_VERSION.to_string()
        }
    }
}

fn clinical_status_code(status: &str) -> Option<&'static str> {
    match status {
        "ACTIVE" => Some("active"),
        "RESOLVED" => Some("resolved"),
        _ => None,
    }
}

fn side_code(side: &str) -> Option<(&'static str, &'static str)> {
    match side {
        "LEFT" => Some(("7771000", "Left")),
        "RIGHT" => Some(("24028007", "Right")),
        "BOTH" => Some(("51440002", "Right and left")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::DIAGNOSIS_TYPE;
    use crate::fhir::{DocumentReferenceContext, Identifier, Reference};
    use serde_json::json;
    use test_case::test_case;

    fn mapper() -> ConditionMapper {
        ConditionMapper::new(Arc::new(MappingSettings::default()))
    }

    fn document() -> DocumentReference {
        DocumentReference {
            id: Some("doc-1".to_string()),
            identifier: vec![Identifier::new("urn:docs", "letter-42")],
            subject: Some(Reference::to("Patient", "p1")),
            date: Some("2021-03-04T10:00:00+01:00".to_string()),
            context: Some(DocumentReferenceContext {
                encounter: vec![Reference::to("Encounter", "e1")],
            }),
            ..Default::default()
        }
    }

    fn diagnosis(overrides: serde_json::Value) -> Annotation {
        let mut value = json!({
            "type": DIAGNOSIS_TYPE,
            "id": 17,
            "begin": 100,
            "end": 111,
            "coveredText": "Hypertonie",
            "uniqueId": "ICD10GM_2021:I10",
            "conceptId": "I10",
            "dictCanon": "Essentielle (primäre) Hypertonie",
            "source": "ICD10GM_2021",
            "clinicalStatus": "ACTIVE",
            "side": null,
            "belongsTo": null,
            "negatedBy": null
        });
        if let (Some(target), Some(extra)) = (value.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        Annotation::from_value(value)
    }

    fn map_one(annotation: &Annotation) -> Option<Condition> {
        let mut resources = mapper().map(annotation, &document()).unwrap();
        assert!(resources.len() <= 1);
        resources.pop().map(|r| match r {
            Resource::Condition(c) => c,
            other => panic!("unexpected resource {other:?}"),
        })
    }

    #[test]
    fn test_maps_active_diagnosis() {
        let condition = map_one(&diagnosis(json!({}))).unwrap();

        let coding = &condition.code.as_ref().unwrap().coding[0];
        assert_eq!(coding.system.as_deref(), Some("http://fhir.de/CodeSystem/dimdi/icd-10-gm"));
        assert_eq!(coding.version.as_deref(), Some("2021"));
        assert_eq!(coding.code.as_deref(), Some("I10"));
        assert_eq!(coding.user_selected, Some(false));

        let status = &condition.clinical_status.as_ref().unwrap().coding[0];
        assert_eq!(status.code.as_deref(), Some("active"));

        assert_eq!(
            condition.identifier[0].value.as_deref(),
            Some("letter-42_100-111_ICD10GM_2021-I10")
        );
        assert_eq!(
            condition.identifier[0].system.as_deref(),
            Some("https://fhir.miracum.org/nlp/identifiers/de-averbis-types-health-diagnosis")
        );
        assert_eq!(condition.recorded_date, document().date);
        assert_eq!(
            condition.encounter.as_ref().and_then(|e| e.reference.as_deref()),
            Some("Encounter/e1")
        );
        assert_eq!(condition.id.len(), 64);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let a = map_one(&diagnosis(json!({}))).unwrap();
        let b = map_one(&diagnosis(json!({}))).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.identifier, b.identifier);
    }

    #[test_case(json!({"belongsTo": "FAMILY"}); "family history")]
    #[test_case(json!({"belongsTo": "OTHER"}); "other person")]
    #[test_case(json!({"negatedBy": "kein"}); "negated")]
    #[test_case(json!({"source": "SNOMED_CT"}); "unknown source")]
    #[test_case(json!({"source": null}); "missing source")]
    #[test_case(json!({"conceptId": null}); "missing code")]
    #[test_case(json!({"conceptId": "  "}); "blank code")]
    fn test_dropped(overrides: serde_json::Value) {
        assert!(map_one(&diagnosis(overrides)).is_none());
    }

    #[test]
    fn test_family_history_is_dropped_regardless_of_other_fields() {
        let annotation = diagnosis(json!({
            "belongsTo": "FAMILY",
            "clinicalStatus": "RESOLVED",
            "side": "LEFT",
            "source": "ICD10GM_2019"
        }));
        assert!(map_one(&annotation).is_none());
    }

    #[test_case("LEFT", "7771000"; "left")]
    #[test_case("RIGHT", "24028007"; "right")]
    #[test_case("BOTH", "51440002"; "both")]
    fn test_body_site(side: &str, code: &str) {
        let condition = map_one(&diagnosis(json!({ "side": side }))).unwrap();
        assert_eq!(condition.body_site[0].coding[0].code.as_deref(), Some(code));
        assert_eq!(
            condition.body_site[0].coding[0].system.as_deref(),
            Some("http://snomed.info/sct")
        );
    }

    #[test]
    fn test_unmapped_side_keeps_condition() {
        let condition = map_one(&diagnosis(json!({ "side": "UPPER" }))).unwrap();
        assert!(condition.body_site.is_empty());
    }

    #[test_case("ICD10GM_2019" => "2019"; "suffix year")]
    #[test_case("ICD10GM" => "2020"; "no year falls back")]
    #[test_case("ICD10GM_20" => "2020"; "short year falls back")]
    fn test_icd_version(source: &str) -> String {
        icd_version(source)
    }

    #[test]
    fn test_recorded_date_falls_back_to_now() {
        let mut doc = document();
        doc.date = None;
        let resources = mapper().map(&diagnosis(json!({})), &doc).unwrap();
        let Resource::Condition(condition) = &resources[0] else {
            panic!("expected a condition");
        };
        assert!(condition.recorded_date.as_deref().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_rejects_other_annotation_kinds() {
        let other = Annotation::Other {
            type_name: "x".to_string(),
        };
        assert!(matches!(
            mapper().map(&other, &document()),
            Err(MappingError::UnexpectedAnnotation { .. })
        ));
    }
}
