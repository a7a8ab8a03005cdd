//! Medication annotations to `Medication` + `MedicationStatement` pairs

use super::common::{deterministic_identifier, document_identifier_value, MappingSettings};
use super::medication::{build_medication, drug_strength};
use super::{dedup_by_id, unexpected, Mapper};
use crate::domain::annotation::{AnnotatedDate, DoseFrequency, Drug, MedicationAnnotation};
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{
    DoseAndRate, Dosage, DocumentReference, Medication, MedicationStatement, Meta, Period,
    PrimitiveExtension, Quantity, Reference, Resource, Timing, TimingRepeat,
};
use std::sync::Arc;

/// Annotation statuses that never produce a statement
const EXCLUDED_STATUSES: [&str; 2] = ["NEGATED", "FAMILY"];

/// Maps `de.averbis.types.health.Medication` annotations
///
/// Every drug entry with an ingredient yields one `Medication` and one
/// `MedicationStatement` referencing it. Many annotations of a document usually
/// name the same drug, so [`Mapper::deduplicate`] collapses both resource kinds
/// by id.
pub struct MedicationMapper {
    settings: Arc<MappingSettings>,
}

impl MedicationMapper {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self { settings }
    }

    /// Statement and medication for every usable drug of the annotation
    pub fn statements(
        &self,
        annotation: &MedicationAnnotation,
        doc: &DocumentReference,
    ) -> Result<Vec<(Medication, MedicationStatement)>, MappingError> {
        if let Some(status) = annotation.status.as_deref() {
            if EXCLUDED_STATUSES.contains(&status) {
                crate::log_annotation_dropped!("medication", annotation.span.id, status);
                return Ok(Vec::new());
            }
        }

        let mut results = Vec::new();

        for drug in annotation.drugs.iter().flatten() {
            let Some(ingredient) = drug.ingredient.as_ref() else {
                tracing::debug!(
                    covered_text = ?drug.covered_text,
                    "Skipping drug without ingredient"
                );
                continue;
            };

            let dose_form = annotation
                .dose_form
                .as_ref()
                .and_then(|f| f.dict_canon.as_deref());

            let Some(medication) = build_medication(
                &self.settings,
                annotation.span.id.as_deref(),
                drug,
                ingredient,
                dose_form,
            ) else {
                continue;
            };

            let statement = self.build_statement(annotation, drug, &medication, doc)?;
            results.push((medication, statement));
        }

        Ok(results)
    }

    fn build_statement(
        &self,
        annotation: &MedicationAnnotation,
        drug: &Drug,
        medication: &Medication,
        doc: &DocumentReference,
    ) -> Result<MedicationStatement, MappingError> {
        let annotation_id = annotation
            .span
            .id
            .as_deref()
            .ok_or(MappingError::MissingField("id"))?;

        let medication_identifier = medication.identifier.first().cloned();
        let medication_value = medication_identifier
            .as_ref()
            .and_then(|i| i.value.as_deref())
            .unwrap_or_default();

        let (identifier, id) = deterministic_identifier(
            self.settings
                .annotation_identifier_system(AnnotationKind::Medication.type_name()),
            format!(
                "{medication_value}_{}_{annotation_id}",
                document_identifier_value(doc)
            ),
        );

        let mut statement = MedicationStatement {
            id,
            meta: Some(Meta::with_profile(&self.settings.profiles.medication_statement)),
            identifier: vec![identifier],
            status: statement_status(annotation.status.as_deref()).to_string(),
            medication_reference: Some(Reference {
                reference_type: Some("Medication".to_string()),
                identifier: medication_identifier,
                ..Reference::to("Medication", &medication.id)
            }),
            subject: doc.subject.clone(),
            context: doc.first_encounter().cloned(),
            date_asserted: doc.date.clone(),
            dosage: build_dosage(drug, annotation.dose_frequency.as_ref())
                .into_iter()
                .collect(),
            ..Default::default()
        };

        match annotation.date.as_ref().and_then(effective) {
            Some(Effective::Period(period)) => statement.effective_period = Some(period),
            Some(Effective::DateTime(value)) => statement.effective_date_time = Some(value),
            None => {
                statement.effective_date_time_extension =
                    Some(PrimitiveExtension::data_absent_unknown())
            }
        }

        Ok(statement)
    }
}

impl Mapper for MedicationMapper {
    fn name(&self) -> &'static str {
        "medication"
    }

    fn annotation_kind(&self) -> AnnotationKind {
        AnnotationKind::Medication
    }

    fn map(
        &self,
        annotation: &Annotation,
        doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError> {
        let Annotation::Medication(medication) = annotation else {
            return Err(unexpected(self.name(), annotation));
        };

        Ok(self
            .statements(medication, doc)?
            .into_iter()
            .flat_map(|(medication, statement)| {
                [
                    Resource::Medication(medication),
                    Resource::MedicationStatement(statement),
                ]
            })
            .collect())
    }

    /// Medications first, then statements, each unique by id
    fn deduplicate(&self, resources: Vec<Resource>) -> Vec<Resource> {
        let (medications, statements): (Vec<_>, Vec<_>) = resources
            .into_iter()
            .partition(|r| matches!(r, Resource::Medication(_)));

        let mut unique = dedup_by_id(medications);
        unique.extend(dedup_by_id(statements));
        unique
    }
}

/// `MedicationStatement.status` for an annotation status
pub fn statement_status(status: Option<&str>) -> &'static str {
    match status {
        Some("ADMISSION" | "INPATIENT" | "DISCHARGE" | "CONDITIONING_TREATMENT") => "active",
        Some("CONSIDERED" | "INTENDED") => "intended",
        _ => "unknown",
    }
}

enum Effective {
    DateTime(String),
    Period(Period),
}

fn effective(date: &AnnotatedDate) -> Option<Effective> {
    if date.kind.as_deref() == Some("DATEINTERVAL") {
        return Some(Effective::Period(Period {
            start: date.start_date.clone(),
            end: date.end_date.clone(),
        }));
    }
    date.value.clone().map(Effective::DateTime)
}

fn build_dosage(drug: &Drug, frequency: Option<&DoseFrequency>) -> Option<Dosage> {
    let (value, unit) = drug_strength(drug)?;

    let mut dosage = Dosage {
        text: drug.covered_text.clone(),
        dose_and_rate: vec![DoseAndRate {
            dose_quantity: Some(Quantity {
                value: Some(value),
                unit: Some(unit),
                ..Default::default()
            }),
        }],
        ..Default::default()
    };

    let Some((frequency, interval)) = frequency.and_then(|f| Some((f, f.interval.as_deref()?)))
    else {
        return Some(dosage);
    };

    dosage.as_needed_boolean = Some(interval == "asneeded");

    let repeat = match interval {
        "daytime" => TimingRepeat {
            when: taken([
                (frequency.morning, "MORN"),
                (frequency.midday, "NOON"),
                (frequency.evening, "EVE"),
                (frequency.at_night, "NIGHT"),
            ]),
            ..Default::default()
        },
        "weektime" => TimingRepeat {
            day_of_week: taken([
                (frequency.monday, "mon"),
                (frequency.tuesday, "tue"),
                (frequency.wednesday, "wed"),
                (frequency.thursday, "thu"),
                (frequency.friday, "fri"),
                (frequency.saturday, "sat"),
                (frequency.sunday, "sun"),
            ]),
            ..Default::default()
        },
        _ => TimingRepeat::default(),
    };

    if !repeat.when.is_empty() || !repeat.day_of_week.is_empty() {
        dosage.timing = Some(Timing {
            repeat: Some(repeat),
        });
    }

    Some(dosage)
}

/// Codes of the slots with a non-zero amount
fn taken<const N: usize>(slots: [(Option<f64>, &str); N]) -> Vec<String> {
    slots
        .into_iter()
        .filter(|(amount, _)| amount.is_some_and(|a| a != 0.0))
        .map(|(_, code)| code.to_string())
        .collect()
}
