//! Minimal FHIR R4 model
//!
//! Serde structs for the FHIR elements ahd2fhir consumes and emits. JSON follows
//! the FHIR conventions: camelCase names, absent optionals and empty arrays omitted,
//! resources discriminated by `resourceType`.

pub mod bundle;
pub mod datatypes;
pub mod resources;

pub use bundle::{Bundle, BundleEntry, BundleEntryRequest};
pub use datatypes::{
    Attachment, CodeableConcept, Coding, Extension, Identifier, Meta, Period, PrimitiveExtension,
    Quantity, Ratio, Reference,
};
pub use resources::{
    Composition, CompositionSection, Condition, Device, DeviceName, DeviceVersion,
    DocumentReference, DocumentReferenceContent, DocumentReferenceContext, DoseAndRate, Dosage,
    ListEntry, ListResource, Medication, MedicationIngredient, MedicationStatement, Observation,
    Timing, TimingRepeat,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Any resource that can appear in a bundle handled by ahd2fhir
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Condition(Condition),
    Medication(Medication),
    MedicationStatement(MedicationStatement),
    Observation(Observation),
    Device(Device),
    List(ListResource),
    Composition(Composition),
    DocumentReference(DocumentReference),
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Condition(_) => ResourceType::Condition,
            Resource::Medication(_) => ResourceType::Medication,
            Resource::MedicationStatement(_) => ResourceType::MedicationStatement,
            Resource::Observation(_) => ResourceType::Observation,
            Resource::Device(_) => ResourceType::Device,
            Resource::List(_) => ResourceType::List,
            Resource::Composition(_) => ResourceType::Composition,
            Resource::DocumentReference(_) => ResourceType::DocumentReference,
        }
    }

    /// Logical id; source documents may lack one
    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::Condition(r) => Some(&r.id),
            Resource::Medication(r) => Some(&r.id),
            Resource::MedicationStatement(r) => Some(&r.id),
            Resource::Observation(r) => Some(&r.id),
            Resource::Device(r) => Some(&r.id),
            Resource::List(r) => Some(&r.id),
            Resource::Composition(r) => Some(&r.id),
            Resource::DocumentReference(r) => r.id.as_deref(),
        }
    }

    /// `{resourceType}/{id}`, the key used for transaction entries and references
    pub fn relative_url(&self) -> String {
        format!("{}/{}", self.resource_type(), self.id().unwrap_or_default())
    }
}

/// Resource type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Condition,
    Medication,
    MedicationStatement,
    Observation,
    Device,
    List,
    Composition,
    DocumentReference,
}

impl ResourceType {
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Condition,
        ResourceType::Medication,
        ResourceType::MedicationStatement,
        ResourceType::Observation,
        ResourceType::Device,
        ResourceType::List,
        ResourceType::Composition,
        ResourceType::DocumentReference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Condition => "Condition",
            ResourceType::Medication => "Medication",
            ResourceType::MedicationStatement => "MedicationStatement",
            ResourceType::Observation => "Observation",
            ResourceType::Device => "Device",
            ResourceType::List => "List",
            ResourceType::Composition => "Composition",
            ResourceType::DocumentReference => "DocumentReference",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
