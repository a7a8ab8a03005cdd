//! Mapper registry and per-document orchestration

use super::common::MappingSettings;
use super::condition::ConditionMapper;
use super::device::DeviceMapper;
use super::kidney_stone::KidneyStoneMapper;
use super::medication_list::MedicationListMapper;
use super::medication_statement::MedicationMapper;
use super::smoking_status::SmokingStatusMapper;
use super::Mapper;
use crate::core::metrics::PipelineMetrics;
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{DocumentReference, Resource};
use std::sync::Arc;
use std::time::Instant;

/// Ordered set of enabled mappers
///
/// The order is the order in which resource types first appear in the output,
/// and therefore the section order of the composition.
pub struct MapperRegistry {
    mappers: Vec<Box<dyn Mapper>>,
}

impl MapperRegistry {
    /// Registry from an explicit mapper list
    pub fn new(mappers: Vec<Box<dyn Mapper>>) -> Self {
        Self { mappers }
    }

    /// Every known mapper in its canonical order
    pub fn with_defaults(settings: Arc<MappingSettings>) -> Self {
        Self::new(vec![
            Box::new(ConditionMapper::new(Arc::clone(&settings))),
            Box::new(MedicationMapper::new(Arc::clone(&settings))),
            Box::new(MedicationListMapper::new(Arc::clone(&settings))),
            Box::new(SmokingStatusMapper::new(Arc::clone(&settings))),
            Box::new(KidneyStoneMapper::new(Arc::clone(&settings))),
            Box::new(DeviceMapper::new(settings)),
        ])
    }

    /// Keeps only the mappers named in `enabled`, preserving registry order
    pub fn filtered<S: AsRef<str>>(self, enabled: &[S]) -> Self {
        let mappers = self
            .mappers
            .into_iter()
            .filter(|m| enabled.iter().any(|name| name.as_ref() == m.name()))
            .collect();
        Self { mappers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.mappers.iter().map(|m| m.name()).collect()
    }

    /// Annotation kinds the enabled mappers consume, without duplicates
    pub fn annotation_kinds(&self) -> Vec<AnnotationKind> {
        let mut kinds = Vec::new();
        for kind in self.mappers.iter().map(|m| m.annotation_kind()) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Comma-joined type names to request from the text analysis service
    pub fn annotation_types(&self) -> String {
        self.annotation_kinds()
            .iter()
            .map(|k| k.type_name())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    pub fn mappers(&self) -> impl Iterator<Item = &dyn Mapper> {
        self.mappers.iter().map(|m| m.as_ref())
    }
}

/// Runs the registry over the annotations of one document
pub struct MapperHandler {
    registry: MapperRegistry,
    metrics: Arc<PipelineMetrics>,
}

impl MapperHandler {
    pub fn new(registry: MapperRegistry, metrics: Arc<PipelineMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Replaces the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Maps all annotations of `doc`
    ///
    /// A mapper error affects only the annotation it occurred on; it is logged,
    /// counted and mapping continues with the next annotation.
    pub fn map_document(
        &self,
        annotations: &[Annotation],
        doc: &DocumentReference,
    ) -> Vec<Resource> {
        let started = Instant::now();
        let mut total = Vec::new();

        for mapper in self.registry.mappers() {
            let produced = if mapper.handles_all_annotations() {
                self.isolate(mapper, None, || {
                    mapper.map_all(annotations, doc, &mut |annotation, e| {
                        self.record_failure(mapper, Some(annotation), &e)
                    })
                })
            } else {
                let kind = mapper.annotation_kind();
                annotations
                    .iter()
                    .filter(|a| a.kind() == Some(kind))
                    .flat_map(|a| self.isolate(mapper, Some(a), || mapper.map(a, doc)))
                    .collect()
            };

            let unique = mapper.deduplicate(produced);
            tracing::debug!(
                mapper = mapper.name(),
                resources = unique.len(),
                "Mapper finished"
            );
            total.extend(unique);
        }

        self.metrics.record_mapping(started.elapsed(), total.len());
        total
    }

    fn isolate<F>(
        &self,
        mapper: &dyn Mapper,
        annotation: Option<&Annotation>,
        run: F,
    ) -> Vec<Resource>
    where
        F: FnOnce() -> Result<Vec<Resource>, MappingError>,
    {
        match run() {
            Ok(resources) => resources,
            Err(e) => {
                self.record_failure(mapper, annotation, &e);
                Vec::new()
            }
        }
    }

    fn record_failure(
        &self,
        mapper: &dyn Mapper,
        annotation: Option<&Annotation>,
        e: &MappingError,
    ) {
        tracing::warn!(
            mapper = mapper.name(),
            annotation_type = annotation.map(|a| a.type_name()).unwrap_or("*"),
            error = %e,
            "Failed to map annotation, skipping it"
        );
        self.metrics.record_mapping_failure(mapper.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::{DIAGNOSIS_TYPE, DOCUMENT_ANNOTATION_TYPE, MEDICATION_TYPE};
    use crate::fhir::{Identifier, ResourceType};
    use serde_json::json;

    fn defaults() -> MapperRegistry {
        MapperRegistry::with_defaults(Arc::new(MappingSettings::default()))
    }

    fn document() -> DocumentReference {
        DocumentReference {
            identifier: vec![Identifier::new("urn:docs", "letter-42")],
            date: Some("2021-03-04".to_string()),
            ..Default::default()
        }
    }

    fn annotations() -> Vec<Annotation> {
        Annotation::from_values([
            json!({
                "type": DIAGNOSIS_TYPE, "id": 1, "begin": 0, "end": 10,
                "uniqueId": "ICD10GM_2020:I10", "conceptId": "I10", "dictCanon": "Hypertonie",
                "source": "ICD10GM_2020"
            }),
            json!({
                "type": MEDICATION_TYPE, "id": 2, "begin": 20, "end": 30, "status": "DISCHARGE",
                "drugs": [{"ingredient": {
                    "conceptID": "C09AA05", "dictCanon": "Ramipril", "source": "Abdamed-Averbis"
                }}]
            }),
            json!({"type": DOCUMENT_ANNOTATION_TYPE, "version": "6.10.0"}),
            json!({"type": "de.averbis.types.health.Laboratory"}),
        ])
    }

    #[test]
    fn test_filtered_keeps_registry_order() {
        let registry = defaults().filtered(&["device", "condition"]);
        assert_eq!(registry.names(), vec!["condition", "device"]);
    }

    #[test]
    fn test_annotation_types_are_unique() {
        let registry = defaults().filtered(&["condition", "medication", "medication_list"]);
        assert_eq!(
            registry.annotation_types(),
            format!("{DIAGNOSIS_TYPE},{MEDICATION_TYPE}")
        );
    }

    #[test]
    fn test_map_document_runs_enabled_mappers_in_order() {
        let handler = MapperHandler::new(
            defaults().filtered(&["condition", "medication", "medication_list", "device"]),
            Arc::new(PipelineMetrics::new()),
        );

        let resources = handler.map_document(&annotations(), &document());
        let types: Vec<_> = resources.iter().map(|r| r.resource_type()).collect();
        assert_eq!(
            types,
            vec![
                ResourceType::Condition,
                ResourceType::Medication,
                ResourceType::MedicationStatement,
                ResourceType::List,
                ResourceType::List,
                ResourceType::List,
                ResourceType::Device,
            ]
        );
    }

    #[test]
    fn test_disabled_mappers_produce_nothing() {
        let handler = MapperHandler::new(
            defaults().filtered(&["device"]),
            Arc::new(PipelineMetrics::new()),
        );
        let resources = handler.map_document(&annotations(), &document());
        assert_eq!(resources.len(), 1);
    }

    struct Exploding;

    impl Mapper for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn annotation_kind(&self) -> AnnotationKind {
            AnnotationKind::Diagnosis
        }

        fn map(
            &self,
            annotation: &Annotation,
            _doc: &DocumentReference,
        ) -> Result<Vec<Resource>, MappingError> {
            match annotation {
                Annotation::Diagnosis(d) if d.concept_id.as_deref() == Some("boom") => {
                    Err(MappingError::MissingField("conceptId"))
                }
                _ => Ok(vec![Resource::Device(crate::fhir::Device {
                    id: "ok".to_string(),
                    ..Default::default()
                })]),
            }
        }
    }

    #[test]
    fn test_mapper_failure_is_isolated_per_annotation() {
        let metrics = Arc::new(PipelineMetrics::new());
        let handler = MapperHandler::new(
            MapperRegistry::new(vec![Box::new(Exploding)]),
            Arc::clone(&metrics),
        );

        let annotations = Annotation::from_values([
            json!({"type": DIAGNOSIS_TYPE, "conceptId": "boom"}),
            json!({"type": DIAGNOSIS_TYPE, "conceptId": "I10"}),
        ]);
        let resources = handler.map_document(&annotations, &document());

        assert_eq!(resources.len(), 1);
        assert_eq!(metrics.snapshot().mapping_failures, 1);
    }

    #[test]
    fn test_handle_all_mapper_failures_are_counted_per_annotation() {
        let metrics = Arc::new(PipelineMetrics::new());
        let handler = MapperHandler::new(
            defaults().filtered(&["medication_list"]),
            Arc::clone(&metrics),
        );

        let mut annotations = annotations();
        annotations.extend(Annotation::from_values([json!({
            "type": MEDICATION_TYPE, "status": "ADMISSION",
            "drugs": [{"ingredient": {"conceptID": "N02BB02", "dictCanon": "Metamizol", "source": "Abdamed"}}]
        })]));

        let resources = handler.map_document(&annotations, &document());

        assert_eq!(resources.len(), 3);
        let Resource::List(discharge) = &resources[0] else {
            panic!("expected the discharge list");
        };
        assert_eq!(discharge.entry.len(), 1);
        assert_eq!(metrics.snapshot().mapping_failures, 1);
    }
}
