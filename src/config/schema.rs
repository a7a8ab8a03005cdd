//! Configuration schema types
//!
//! This module defines the configuration structure for ahd2fhir. Every section
//! has serde defaults so that a minimal file only needs the `[ahd]` connection.

use crate::config::SecretString;
use crate::core::mapping::{DEFAULT_MAPPERS, MAPPER_NAMES};
use serde::{Deserialize, Serialize};

/// How the id of the produced transaction bundle is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BundleIdMode {
    /// The composition id for a single document, a fresh UUID for batches
    #[default]
    Auto,
    /// Always the composition id of the last processed document
    LastComposition,
    /// Always a fresh UUID
    Random,
}

/// Main ahd2fhir configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ahd2FhirConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Averbis Health Discovery connection
    pub ahd: AhdConfig,

    /// Which mappers run and how they behave
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Code systems, profiles and identifier namespace of produced resources
    #[serde(default)]
    pub fhir: FhirConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Ahd2FhirConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.ahd.validate()?;
        self.mapping.validate()?;
        self.fhir.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Averbis Health Discovery connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AhdConfig {
    /// Base URL, e.g. `https://ahd.example.com/health-discovery`
    pub url: String,

    /// API token sent in the `api-token` header; takes precedence over basic auth
    #[serde(default)]
    pub api_token: Option<SecretString>,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Text analysis project
    #[serde(default = "default_project")]
    pub project: String,

    /// Pipeline within the project
    #[serde(default = "default_pipeline")]
    pub pipeline: String,

    /// REST API version segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification
    ///
    /// Only disable this against test servers with self-signed certificates.
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Retry policy around the analysis call
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AhdConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.url.is_empty() {
            return Err("ahd.url cannot be empty".to_string());
        }

        let parsed = url::Url::parse(&self.url)
            .map_err(|e| format!("ahd.url '{}' is not a valid URL: {}", self.url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("ahd.url must start with http:// or https://".to_string());
        }

        let has_token = self
            .api_token
            .as_ref()
            .map(|t| !t.expose_secret().is_empty())
            .unwrap_or(false);
        let has_username = self.username.as_ref().map(|u| !u.is_empty()).unwrap_or(false);
        let has_password = self
            .password
            .as_ref()
            .map(|p| !p.expose_secret().is_empty())
            .unwrap_or(false);

        if !has_token && !(has_username && has_password) {
            return Err(
                "ahd.api_token or both ahd.username and ahd.password must be set".to_string(),
            );
        }

        if self.project.is_empty() {
            return Err("ahd.project cannot be empty".to_string());
        }
        if self.pipeline.is_empty() {
            return Err("ahd.pipeline cannot be empty".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("ahd.timeout_seconds must be greater than 0".to_string());
        }

        self.retry.validate()?;
        Ok(())
    }
}

/// Retry policy for the text analysis call
///
/// Wait before attempt n+1 is `fixed_wait_seconds` plus a random jitter drawn
/// uniformly from `[0, min(jitter_max_seconds, jitter_multiplier * 2^(n-1))]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_fixed_wait_seconds")]
    pub fixed_wait_seconds: f64,

    #[serde(default = "default_jitter_multiplier")]
    pub jitter_multiplier: f64,

    #[serde(default = "default_jitter_max_seconds")]
    pub jitter_max_seconds: f64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if !(1..=50).contains(&self.max_attempts) {
            return Err(format!(
                "ahd.retry.max_attempts must be between 1 and 50, got {}",
                self.max_attempts
            ));
        }
        for (name, value) in [
            ("fixed_wait_seconds", self.fixed_wait_seconds),
            ("jitter_multiplier", self.jitter_multiplier),
            ("jitter_max_seconds", self.jitter_max_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "ahd.retry.{name} must be a non-negative number, got {value}"
                ));
            }
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            fixed_wait_seconds: default_fixed_wait_seconds(),
            jitter_multiplier: default_jitter_multiplier(),
            jitter_max_seconds: default_jitter_max_seconds(),
        }
    }
}

/// Mapper selection and mapping behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Mappers to run, by name; order in this list does not matter
    #[serde(default = "default_enabled_mappers")]
    pub enabled_mappers: Vec<String>,

    /// Emit the smoking status as `valueString` instead of a coded value
    #[serde(default)]
    pub smoking_status_as_value_string: bool,

    /// Bundle id strategy
    #[serde(default)]
    pub bundle_id: BundleIdMode,
}

impl MappingConfig {
    fn validate(&self) -> Result<(), String> {
        for name in &self.enabled_mappers {
            if !MAPPER_NAMES.contains(&name.as_str()) {
                return Err(format!(
                    "Unknown mapper '{}' in mapping.enabled_mappers. Must be one of: {}",
                    name,
                    MAPPER_NAMES.join(", ")
                ));
            }
        }
        Ok(())
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            enabled_mappers: default_enabled_mappers(),
            smoking_status_as_value_string: false,
            bundle_id: BundleIdMode::default(),
        }
    }
}

/// FHIR output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    /// Namespace prepended to every identifier system
    #[serde(default = "default_identifier_base")]
    pub identifier_base: String,

    #[serde(default)]
    pub systems: FhirSystemsConfig,

    #[serde(default)]
    pub profiles: FhirProfilesConfig,
}

impl FhirConfig {
    fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.identifier_base).map_err(|e| {
            format!(
                "fhir.identifier_base '{}' is not a valid URL: {}",
                self.identifier_base, e
            )
        })?;
        Ok(())
    }
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            identifier_base: default_identifier_base(),
            systems: FhirSystemsConfig::default(),
            profiles: FhirProfilesConfig::default(),
        }
    }
}

/// Code system URIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirSystemsConfig {
    #[serde(default = "default_icd_10_gm")]
    pub icd_10_gm: String,
    #[serde(default = "default_snomed_ct")]
    pub snomed_ct: String,
    #[serde(default = "default_condition_clinical_status")]
    pub condition_clinical_status: String,
    #[serde(default = "default_ucum")]
    pub ucum: String,
    #[serde(default = "default_atc")]
    pub atc: String,
    #[serde(default = "default_rxnorm")]
    pub rxnorm: String,
    #[serde(default = "default_loinc")]
    pub loinc: String,
}

impl Default for FhirSystemsConfig {
    fn default() -> Self {
        Self {
            icd_10_gm: default_icd_10_gm(),
            snomed_ct: default_snomed_ct(),
            condition_clinical_status: default_condition_clinical_status(),
            ucum: default_ucum(),
            atc: default_atc(),
            rxnorm: default_rxnorm(),
            loinc: default_loinc(),
        }
    }
}

/// Profile URIs attached as `meta.profile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirProfilesConfig {
    #[serde(default = "default_condition_profile")]
    pub condition: String,
    #[serde(default = "default_medication_profile")]
    pub medication: String,
    #[serde(default = "default_medication_statement_profile")]
    pub medication_statement: String,
    #[serde(default = "default_observation_profile")]
    pub observation: String,
    #[serde(default = "default_medication_list_profile")]
    pub medication_list: String,
}

impl Default for FhirProfilesConfig {
    fn default() -> Self {
        Self {
            condition: default_condition_profile(),
            medication: default_medication_profile(),
            medication_statement: default_medication_statement_profile(),
            observation: default_observation_profile(),
            medication_list: default_medication_list_profile(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to rolling files
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_log_path")]
    pub local_path: String,

    /// Rotation: daily or hourly
    #[serde(default = "default_log_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_log_path(),
            local_rotation: default_log_rotation(),
        }
    }
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_project() -> String {
    "default".to_string()
}

fn default_pipeline() -> String {
    "discharge".to_string()
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    10
}

fn default_fixed_wait_seconds() -> f64 {
    5.0
}

fn default_jitter_multiplier() -> f64 {
    1.0
}

fn default_jitter_max_seconds() -> f64 {
    30.0
}

fn default_enabled_mappers() -> Vec<String> {
    DEFAULT_MAPPERS.iter().map(|s| s.to_string()).collect()
}

fn default_identifier_base() -> String {
    "https://fhir.miracum.org/nlp/identifiers/".to_string()
}

fn default_icd_10_gm() -> String {
    "http://fhir.de/CodeSystem/dimdi/icd-10-gm".to_string()
}

fn default_snomed_ct() -> String {
    "http://snomed.info/sct".to_string()
}

fn default_condition_clinical_status() -> String {
    "http://terminology.hl7.org/CodeSystem/condition-clinical".to_string()
}

fn default_ucum() -> String {
    "http://unitsofmeasure.org".to_string()
}

fn default_atc() -> String {
    "http://fhir.de/CodeSystem/dimdi/atc".to_string()
}

fn default_rxnorm() -> String {
    "http://www.nlm.nih.gov/research/umls/rxnorm".to_string()
}

fn default_loinc() -> String {
    "http://loinc.org".to_string()
}

fn default_condition_profile() -> String {
    "https://www.medizininformatik-initiative.de/fhir/core/modul-diagnose/StructureDefinition/Diagnose"
        .to_string()
}

fn default_medication_profile() -> String {
    "https://www.medizininformatik-initiative.de/fhir/core/modul-medikation/StructureDefinition/Medication"
        .to_string()
}

fn default_medication_statement_profile() -> String {
    "https://www.medizininformatik-initiative.de/fhir/core/modul-medikation/StructureDefinition/MedicationStatement"
        .to_string()
}

fn default_observation_profile() -> String {
    "https://www.medizininformatik-initiative.de/fhir/core/StructureDefinition/Observation"
        .to_string()
}

fn default_medication_list_profile() -> String {
    "https://gematik.de/fhir/isik/v3/Medikation/StructureDefinition/ISiKMedikationsListe"
        .to_string()
}

fn default_log_path() -> String {
    "/var/log/ahd2fhir".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}
