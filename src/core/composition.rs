//! Per-document `Composition` indexing the mapped resources

use crate::core::mapping::common::{deterministic_identifier, document_identifier_value};
use crate::core::mapping::device::DEVICE_NAME;
use crate::core::mapping::MappingSettings;
use crate::fhir::{
    CodeableConcept, Coding, Composition, CompositionSection, DocumentReference, Reference,
    Resource, ResourceType,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

const DEFAULT_DOCUMENT_TYPE_TEXT: &str =
    "Clinical document Kind of document from LOINC Document Ontology";

/// Builds the result composition of one analysed document
///
/// Resources are grouped into one section per resource type, in order of first
/// appearance. A `Device` is not sectioned but becomes the author.
#[derive(Debug, Clone)]
pub struct CompositionBuilder {
    settings: Arc<MappingSettings>,
    fixed_date: Option<DateTime<Utc>>,
}

impl CompositionBuilder {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self {
            settings,
            fixed_date: None,
        }
    }

    /// Uses `date` instead of the wall clock for `Composition.date` and the title
    pub fn with_fixed_date(mut self, date: DateTime<Utc>) -> Self {
        self.fixed_date = Some(date);
        self
    }

    pub fn build(&self, doc: &DocumentReference, resources: &[Resource]) -> Composition {
        let date = self.fixed_date.unwrap_or_else(Utc::now);

        let mut author = None;
        let mut sections: Vec<CompositionSection> = Vec::new();

        for resource in resources {
            let resource_type = resource.resource_type();
            let id = resource.id().unwrap_or_default();

            match resource_type {
                ResourceType::Composition => continue,
                ResourceType::Device => {
                    author = Some(Reference {
                        reference_type: Some(resource_type.to_string()),
                        ..Reference::to(resource_type.as_str(), id)
                    });
                    continue;
                }
                _ => {}
            }

            let entry = Reference::to(resource_type.as_str(), id);
            match sections
                .iter_mut()
                .find(|s| s.title.as_deref() == Some(resource_type.as_str()))
            {
                Some(section) => section.entry.push(entry),
                None => sections.push(CompositionSection {
                    title: Some(resource_type.to_string()),
                    entry: vec![entry],
                }),
            }
        }

        let author = author.unwrap_or_else(|| Reference {
            display: Some(DEVICE_NAME.to_string()),
            ..Default::default()
        });

        if doc.encounters().len() > 1 {
            tracing::warn!(
                document_id = ?doc.id,
                "Document has more than one encounter, using the first"
            );
        }

        let (identifier, id) = deterministic_identifier(
            self.settings
                .identifier_system("ahd-analysis-result-composition"),
            format!("{}_ahd-analysis-result", document_identifier_value(doc)),
        );

        Composition {
            id,
            identifier: Some(identifier),
            status: "final".to_string(),
            composition_type: doc.doc_type.clone().unwrap_or_else(|| {
                CodeableConcept::from_coding(Coding::new(
                    &self.settings.systems.loinc,
                    "74477-1",
                    DEFAULT_DOCUMENT_TYPE_TEXT,
                ))
                .with_text(DEFAULT_DOCUMENT_TYPE_TEXT)
            }),
            category: doc.category.clone(),
            subject: doc.subject.clone(),
            encounter: doc.first_encounter().cloned(),
            date: date.to_rfc3339_opts(SecondsFormat::Secs, true),
            author: vec![author],
            title: format!("NLP FHIR Results {}", date.format("%Y-%m-%dT%H:%M")),
            section: sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::{Condition, Device, DocumentReferenceContext, Identifier, Observation};
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn builder() -> CompositionBuilder {
        CompositionBuilder::new(Arc::new(MappingSettings::default()))
            .with_fixed_date(Utc.with_ymd_and_hms(2021, 3, 4, 10, 30, 0).unwrap())
    }

    fn document() -> DocumentReference {
        DocumentReference {
            identifier: vec![Identifier::new("urn:docs", "letter-42")],
            subject: Some(Reference::to("Patient", "p1")),
            context: Some(DocumentReferenceContext {
                encounter: vec![Reference::to("Encounter", "e1"), Reference::to("Encounter", "e2")],
            }),
            ..Default::default()
        }
    }

    fn condition(id: &str) -> Resource {
        Resource::Condition(Condition {
            id: id.to_string(),
            ..Default::default()
        })
    }

    fn observation(id: &str) -> Resource {
        Resource::Observation(Observation {
            id: id.to_string(),
            status: "final".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_resources_give_empty_sections_and_fallback_author() {
        let composition = builder().build(&document(), &[]);
        assert!(composition.section.is_empty());
        assert_eq!(composition.author[0].display.as_deref(), Some("Averbis Health Discovery"));
        assert_eq!(composition.status, "final");
        assert_eq!(composition.date, "2021-03-04T10:30:00Z");
        assert_eq!(composition.title, "NLP FHIR Results 2021-03-04T10:30");
        assert_eq!(
            composition.composition_type.coding[0].code.as_deref(),
            Some("74477-1")
        );
        assert_eq!(
            composition.encounter.as_ref().and_then(|e| e.reference.as_deref()),
            Some("Encounter/e1")
        );
    }

    #[test]
    fn test_sections_follow_first_appearance() {
        let resources = vec![
            observation("o1"),
            condition("c1"),
            observation("o2"),
            Resource::Device(Device {
                id: "d1".to_string(),
                ..Default::default()
            }),
        ];
        let composition = builder().build(&document(), &resources);

        let titles: Vec<_> = composition
            .section
            .iter()
            .map(|s| s.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["Observation", "Condition"]);
        assert_eq!(composition.section[0].entry.len(), 2);
        assert_eq!(
            composition.author[0].reference.as_deref(),
            Some("Device/d1")
        );
        assert_eq!(composition.author[0].reference_type.as_deref(), Some("Device"));

        let referenced: HashSet<_> = composition
            .section
            .iter()
            .flat_map(|s| s.entry.iter().filter_map(|e| e.reference.clone()))
            .collect();
        let expected: HashSet<_> = ["Observation/o1", "Observation/o2", "Condition/c1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(referenced, expected);
    }

    #[test]
    fn test_id_depends_only_on_document() {
        let a = builder().build(&document(), &[condition("c1")]);
        let b = builder().build(&document(), &[]);
        assert_eq!(a.id, b.id);
        assert_eq!(
            a.identifier.unwrap().value.as_deref(),
            Some("letter-42_ahd-analysis-result")
        );
    }

    #[test]
    fn test_document_type_is_reused() {
        let mut doc = document();
        doc.doc_type = Some(CodeableConcept::default().with_text("Arztbrief"));
        let composition = builder().build(&doc, &[]);
        assert_eq!(composition.composition_type.text.as_deref(), Some("Arztbrief"));
    }
}
