//! Deterministic resource identifiers
//!
//! Every mapped FHIR resource carries a business identifier (system + value) built
//! from stable inputs, and a logical id that is the SHA-256 digest of that identifier.
//! Mapping the same annotation twice therefore yields the same id, which is what makes
//! the PUT-based transaction bundles replayable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// FHIR logical resource id
///
/// # Examples
///
/// ```
/// use ahd2fhir::domain::ids::ResourceId;
///
/// let id = ResourceId::from_identifier("https://example.org/ids", "doc-1_0-5_x");
/// assert_eq!(id.as_str().len(), 64);
/// assert_eq!(id, ResourceId::from_identifier("https://example.org/ids", "doc-1_0-5_x"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a ResourceId from an existing id string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Resource ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Derives the id as the hex SHA-256 digest of `"{system}|{value}"`
    pub fn from_identifier(system: &str, value: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(system.as_bytes());
        hasher.update(b"|");
        hasher.update(value.as_bytes());
        let digest = hasher.finalize();

        Self(format!("{digest:x}"))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Slug used in identifier systems: dots become dashes, everything lower-cased
///
/// `de.averbis.types.health.Diagnosis` becomes `de-averbis-types-health-diagnosis`.
pub fn type_slug(type_name: &str) -> String {
    type_name.replace('.', "-").to_lowercase()
}
