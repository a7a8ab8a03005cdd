//! Admission, inpatient and discharge medication lists
//!
//! Unlike the other mappers this one needs the whole document: it sorts the
//! medication statements of all annotations into one `List` per encounter phase.

use super::common::{deterministic_identifier, document_identifier_value, MappingSettings};
use super::medication_statement::MedicationMapper;
use super::Mapper;
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{
    CodeableConcept, Coding, DocumentReference, ListEntry, ListResource, Meta, Reference, Resource,
};
use std::collections::HashSet;
use std::sync::Arc;

const LIST_USE_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/list-example-use-codes";
const LIST_CONTEXT_CODE_SYSTEM: &str =
    "http://ihe-d.de/CodeSystems/FallkontextBeiDokumentenerstellung";

/// Phase of the stay a medication list covers, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListBucket {
    Discharge = 0,
    Admission = 1,
    Inpatient = 2,
}

impl ListBucket {
    pub const ALL: [ListBucket; 3] = [Self::Discharge, Self::Admission, Self::Inpatient];

    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "DISCHARGE" => Some(Self::Discharge),
            "ADMISSION" => Some(Self::Admission),
            "INPATIENT" => Some(Self::Inpatient),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Discharge => "discharge",
            Self::Admission => "admission",
            Self::Inpatient => "inpatient",
        }
    }

    fn context_code(&self) -> &'static str {
        match self {
            Self::Admission => "E210",
            Self::Inpatient => "E200",
            Self::Discharge => "E230",
        }
    }

    /// Inpatient lists are still being worked on while the stay lasts
    fn mode(&self) -> &'static str {
        match self {
            Self::Inpatient => "working",
            _ => "snapshot",
        }
    }
}

pub struct MedicationListMapper {
    settings: Arc<MappingSettings>,
    statements: MedicationMapper,
}

impl MedicationListMapper {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self {
            statements: MedicationMapper::new(Arc::clone(&settings)),
            settings,
        }
    }

    fn build_list(
        &self,
        bucket: ListBucket,
        entries: Vec<ListEntry>,
        doc: &DocumentReference,
        doc_identifier: &str,
    ) -> ListResource {
        let label = bucket.label();

        let (identifier, id) = deterministic_identifier(
            self.settings
                .identifier_system(&format!("{label}-medication-list")),
            format!("{label}_list_{doc_identifier}"),
        );

        let empty_reason = entries.is_empty().then(|| CodeableConcept {
            coding: Vec::new(),
            text: Some(format!("No {label} entries in document found.")),
        });

        ListResource {
            id,
            meta: Some(Meta::with_profile(&self.settings.profiles.medication_list)),
            identifier: vec![identifier],
            status: "current".to_string(),
            mode: bucket.mode().to_string(),
            title: Some(format!("List of {label} medication")),
            code: Some(CodeableConcept {
                coding: vec![
                    Coding {
                        system: Some(LIST_USE_CODE_SYSTEM.to_string()),
                        code: Some("medications".to_string()),
                        ..Default::default()
                    },
                    Coding {
                        system: Some(LIST_CONTEXT_CODE_SYSTEM.to_string()),
                        code: Some(bucket.context_code().to_string()),
                        ..Default::default()
                    },
                ],
                text: Some("List Code".to_string()),
            }),
            subject: doc.subject.clone(),
            encounter: doc.first_encounter().cloned(),
            date: doc.date.clone(),
            entry: entries,
            empty_reason,
        }
    }
}

impl Mapper for MedicationListMapper {
    fn name(&self) -> &'static str {
        "medication_list"
    }

    fn annotation_kind(&self) -> AnnotationKind {
        AnnotationKind::Medication
    }

    fn handles_all_annotations(&self) -> bool {
        true
    }

    fn map(
        &self,
        annotation: &Annotation,
        doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError> {
        let mut failure = None;
        let lists = self.map_all(std::slice::from_ref(annotation), doc, &mut |_, e| {
            failure.get_or_insert(e);
        })?;
        match failure {
            Some(e) => Err(e),
            None => Ok(lists),
        }
    }

    fn map_all(
        &self,
        annotations: &[Annotation],
        doc: &DocumentReference,
        on_failure: &mut dyn FnMut(&Annotation, MappingError),
    ) -> Result<Vec<Resource>, MappingError> {
        if annotations.is_empty() {
            return Ok(Vec::new());
        }

        let mut buckets: [Vec<ListEntry>; 3] = Default::default();
        let mut seen: HashSet<String> = HashSet::new();

        for annotation in annotations {
            let Annotation::Medication(medication) = annotation else {
                continue;
            };

            let Some(status) = medication.status.as_deref() else {
                continue;
            };
            let Some(bucket) = ListBucket::from_status(status) else {
                tracing::debug!(
                    status = %status,
                    "Medication is not part of an admission, inpatient or discharge list"
                );
                continue;
            };

            let statements = match self.statements.statements(medication, doc) {
                Ok(statements) => statements,
                Err(e) => {
                    on_failure(annotation, e);
                    continue;
                }
            };

            for (_, statement) in statements {
                let reference = format!("MedicationStatement/{}", statement.id);
                if !seen.insert(reference.clone()) {
                    continue;
                }

                let entry = ListEntry {
                    date: (bucket == ListBucket::Inpatient)
                        .then(|| doc.date.clone())
                        .flatten(),
                    item: Reference {
                        reference: Some(reference),
                        reference_type: Some("MedicationStatement".to_string()),
                        identifier: statement.identifier.first().cloned(),
                        display: None,
                    },
                };
                buckets[bucket as usize].push(entry);
            }
        }

        let doc_identifier = document_identifier_value(doc);

        Ok(ListBucket::ALL
            .into_iter()
            .zip(buckets)
            .map(|(bucket, entries)| {
                Resource::List(self.build_list(bucket, entries, doc, &doc_identifier))
            })
            .collect())
    }
}
