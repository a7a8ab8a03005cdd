//! FHIR `Bundle`
//!
//! Used both for input (a collection of DocumentReferences, possibly mixed with
//! other resources) and output (the transaction bundle). Entry resources whose type
//! is not modelled by [`Resource`] read as empty entries.

use super::{Resource, ResourceType};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(rename = "resourceType", default)]
    pub resource_type: BundleResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

/// The literal `"resourceType": "Bundle"`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleResourceType {
    #[default]
    Bundle,
}

impl Bundle {
    /// Resources carried by the entries, in entry order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entry.iter().filter_map(|e| e.resource.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "modelled_resource",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource: Option<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntryRequest {
    pub method: String,
    pub url: String,
}

fn modelled_resource<'de, D>(deserializer: D) -> Result<Option<Resource>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let modelled = value
        .get("resourceType")
        .and_then(Value::as_str)
        .and_then(ResourceType::from_name)
        .is_some();
    if !modelled {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}
