//! The analysing engine as a `Device`, the author of every result composition

use super::common::{deterministic_identifier, MappingSettings};
use super::{dedup_by_id, unexpected, Mapper};
use crate::domain::{Annotation, AnnotationKind, MappingError};
use crate::fhir::{Device, DeviceName, DeviceVersion, DocumentReference, Resource};
use std::sync::Arc;

pub const DEVICE_MANUFACTURER: &str = "Averbis GmbH";
pub const DEVICE_NAME: &str = "Averbis Health Discovery";

pub struct DeviceMapper {
    settings: Arc<MappingSettings>,
}

impl DeviceMapper {
    pub fn new(settings: Arc<MappingSettings>) -> Self {
        Self { settings }
    }
}

impl Mapper for DeviceMapper {
    fn name(&self) -> &'static str {
        "device"
    }

    fn annotation_kind(&self) -> AnnotationKind {
        AnnotationKind::DocumentAnnotation
    }

    fn map(
        &self,
        annotation: &Annotation,
        _doc: &DocumentReference,
    ) -> Result<Vec<Resource>, MappingError> {
        let Annotation::DocumentAnnotation(document_annotation) = annotation else {
            return Err(unexpected(self.name(), annotation));
        };

        let Some(version) = document_annotation.version.as_deref() else {
            crate::log_annotation_dropped!(
                "device",
                document_annotation.span.id,
                "no engine version"
            );
            return Ok(Vec::new());
        };

        let (identifier, id) = deterministic_identifier(
            self.settings
                .identifier_system("averbis-health-discovery-device-id"),
            format!("ahd-v{version}"),
        );

        Ok(vec![Resource::Device(Device {
            id,
            identifier: vec![identifier],
            status: Some("active".to_string()),
            manufacturer: Some(DEVICE_MANUFACTURER.to_string()),
            device_name: vec![DeviceName {
                name: DEVICE_NAME.to_string(),
                name_type: "manufacturer-name".to_string(),
            }],
            version: vec![DeviceVersion {
                value: version.to_string(),
            }],
        })])
    }

    fn deduplicate(&self, resources: Vec<Resource>) -> Vec<Resource> {
        dedup_by_id(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::DOCUMENT_ANNOTATION_TYPE;
    use serde_json::json;

    fn mapper() -> DeviceMapper {
        DeviceMapper::new(Arc::new(MappingSettings::default()))
    }

    #[test]
    fn test_maps_engine_version() {
        let annotation = Annotation::from_value(json!({
            "type": DOCUMENT_ANNOTATION_TYPE,
            "version": "6.10.0",
            "language": "de"
        }));
        let resources = mapper()
            .map(&annotation, &DocumentReference::default())
            .unwrap();

        let Resource::Device(device) = &resources[0] else {
            panic!("expected a device");
        };
        assert_eq!(device.identifier[0].value.as_deref(), Some("ahd-v6.10.0"));
        assert_eq!(
            device.identifier[0].system.as_deref(),
            Some("https://fhir.miracum.org/nlp/identifiers/averbis-health-discovery-device-id")
        );
        assert_eq!(device.manufacturer.as_deref(), Some(DEVICE_MANUFACTURER));
        assert_eq!(device.version[0].value, "6.10.0");
        assert_eq!(device.device_name[0].name_type, "manufacturer-name");
    }

    #[test]
    fn test_missing_version_is_dropped() {
        let annotation = Annotation::from_value(json!({"type": DOCUMENT_ANNOTATION_TYPE}));
        assert!(mapper()
            .map(&annotation, &DocumentReference::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_same_version_collapses_to_one_device() {
        let annotation = Annotation::from_value(json!({
            "type": DOCUMENT_ANNOTATION_TYPE,
            "version": "6.10.0"
        }));
        let mapper = mapper();
        let doc = DocumentReference::default();
        let mut resources = mapper.map(&annotation, &doc).unwrap();
        resources.extend(mapper.map(&annotation, &doc).unwrap());
        assert_eq!(mapper.deduplicate(resources).len(), 1);
    }
}
