//! Helpers shared by the mappers

use crate::config::{Ahd2FhirConfig, FhirConfig, FhirProfilesConfig, FhirSystemsConfig};
use crate::domain::annotation::Span;
use crate::domain::ids::{type_slug, ResourceId};
use crate::fhir::{DocumentReference, Identifier, Resource};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;

/// Read-only settings every mapper needs
#[derive(Debug, Clone, PartialEq)]
pub struct MappingSettings {
    pub identifier_base: String,
    pub systems: FhirSystemsConfig,
    pub profiles: FhirProfilesConfig,
    pub smoking_status_as_value_string: bool,
}

impl MappingSettings {
    pub fn from_config(config: &Ahd2FhirConfig) -> Self {
        Self {
            smoking_status_as_value_string: config.mapping.smoking_status_as_value_string,
            ..Self::from_fhir_config(&config.fhir)
        }
    }

    pub fn from_fhir_config(fhir: &FhirConfig) -> Self {
        Self {
            identifier_base: fhir.identifier_base.clone(),
            systems: fhir.systems.clone(),
            profiles: fhir.profiles.clone(),
            smoking_status_as_value_string: false,
        }
    }

    /// `{identifier_base}/{suffix}`, tolerant of a trailing slash on the base
    pub fn identifier_system(&self, suffix: &str) -> String {
        format!("{}/{}", self.identifier_base.trim_end_matches('/'), suffix)
    }

    /// Identifier system for resources derived from an annotation type
    pub fn annotation_identifier_system(&self, type_name: &str) -> String {
        self.identifier_system(&type_slug(type_name))
    }
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self::from_fhir_config(&FhirConfig::default())
    }
}

/// Deterministic identifier plus the id derived from it
pub fn deterministic_identifier(system: String, value: String) -> (Identifier, String) {
    let id = ResourceId::from_identifier(&system, &value).into_inner();
    (Identifier::new(system, value), id)
}

/// Stable value identifying the source document
///
/// First identifier value, falling back to the logical id. Documents carrying
/// neither produce an empty value and a warning; their resources can then
/// collide with those of other anonymous documents.
pub fn document_identifier_value(doc: &DocumentReference) -> String {
    if doc.identifier.len() > 1 {
        tracing::warn!(
            document_id = ?doc.id,
            count = doc.identifier.len(),
            "Document has more than one identifier, using the first"
        );
    }

    if let Some(value) = doc.identifier.first().and_then(|i| i.value.clone()) {
        return value;
    }
    if let Some(id) = &doc.id {
        return id.clone();
    }

    tracing::warn!("Document has neither an identifier nor an id");
    String::new()
}

/// `{doc}_{begin}-{end}_{uniqueId}` with `:` in the unique id replaced by `-`
pub fn positional_identifier_value(
    doc_identifier: &str,
    span: &Span,
    unique_id: Option<&str>,
) -> String {
    format!(
        "{}_{}-{}_{}",
        doc_identifier,
        opt_to_string(span.begin),
        opt_to_string(span.end),
        unique_id.unwrap_or_default().replace(':', "-")
    )
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Rounds to 5 fractional digits
pub fn round_quantity(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Current time as a FHIR dateTime
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Collapses resources with equal type and id, last one wins, first position kept
pub fn dedup_by_id(resources: Vec<Resource>) -> Vec<Resource> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Resource> = Vec::with_capacity(resources.len());

    for resource in resources {
        let key = resource.relative_url();
        match positions.get(&key) {
            Some(&index) => unique[index] = resource,
            None => {
                positions.insert(key, unique.len());
                unique.push(resource);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::Device;
    use test_case::test_case;

    #[test_case(1.111111111111 => 1.11111; "noise is cut")]
    #[test_case(500.0 => 500.0; "integers stay")]
    #[test_case(0.123456 => 0.12346; "rounds half up")]
    #[test_case(-2.5000049 => -2.5; "negative")]
    fn test_round_quantity(value: f64) -> f64 {
        round_quantity(value)
    }

    #[test]
    fn test_identifier_system_joins_with_single_slash() {
        let mut settings = MappingSettings::default();
        assert_eq!(
            settings.identifier_system("x"),
            "https://fhir.miracum.org/nlp/identifiers/x"
        );

        settings.identifier_base = "https://example.org/ids".to_string();
        assert_eq!(settings.identifier_system("x"), "https://example.org/ids/x");
    }

    #[test]
    fn test_document_identifier_fallback_chain() {
        let mut doc = DocumentReference {
            id: Some("doc-id".to_string()),
            ..Default::default()
        };
        assert_eq!(document_identifier_value(&doc), "doc-id");

        doc.identifier = vec![Identifier::new("urn:system", "doc-identifier")];
        assert_eq!(document_identifier_value(&doc), "doc-identifier");

        doc.id = None;
        doc.identifier.clear();
        assert_eq!(document_identifier_value(&doc), "");
    }

    #[test]
    fn test_positional_identifier_value() {
        let span = Span {
            begin: Some(4),
            end: Some(12),
            ..Default::default()
        };
        assert_eq!(
            positional_identifier_value("doc", &span, Some("ICD10GM_2020:I10")),
            "doc_4-12_ICD10GM_2020-I10"
        );
    }

    #[test]
    fn test_dedup_by_id_last_write_wins_and_is_idempotent() {
        let device = |id: &str, version: &str| {
            Resource::Device(Device {
                id: id.to_string(),
                manufacturer: Some(version.to_string()),
                ..Default::default()
            })
        };
        let resources = vec![device("a", "1"), device("b", "1"), device("a", "2")];

        let once = dedup_by_id(resources);
        assert_eq!(once, vec![device("a", "2"), device("b", "1")]);
        assert_eq!(dedup_by_id(once.clone()), once);
    }
}
