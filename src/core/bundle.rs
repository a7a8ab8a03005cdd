//! Transaction bundle assembly

use crate::fhir::{Bundle, BundleEntry, BundleEntryRequest, Resource};
use uuid::Uuid;

/// Wraps resources into a FHIR transaction bundle
///
/// Every resource becomes a `PUT {type}/{id}` entry, so replaying a bundle
/// overwrites instead of duplicating. Entries are not deduplicated here.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleBuilder;

impl BundleBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Builds the bundle; without an `id` a random UUID v4 is used
    pub fn build(&self, resources: Vec<Resource>, id: Option<String>) -> Bundle {
        let entry = resources
            .into_iter()
            .map(|resource| {
                let url = resource.relative_url();
                BundleEntry {
                    full_url: Some(url.clone()),
                    resource: Some(resource),
                    request: Some(BundleEntryRequest {
                        method: "PUT".to_string(),
                        url,
                    }),
                }
            })
            .collect();

        Bundle {
            id: Some(id.unwrap_or_else(|| Uuid::new_v4().to_string())),
            bundle_type: "transaction".to_string(),
            entry,
            ..Default::default()
        }
    }
}
