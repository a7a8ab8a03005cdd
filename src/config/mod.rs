//! Configuration management for ahd2fhir.
//!
//! TOML configuration with `${VAR_NAME}` substitution, `AHD2FHIR_*` environment
//! overrides, serde defaults and validation on load.
//!
//! # Example Configuration
//!
//! ```toml
//! [ahd]
//! url = "https://ahd.example.com/health-discovery"
//! api_token = "${AHD_API_TOKEN}"
//! project = "nlp"
//! pipeline = "discharge"
//!
//! [mapping]
//! enabled_mappers = ["condition", "medication", "medication_list", "device"]
//! ```
//!
//! # Sections
//!
//! - [`ApplicationConfig`] - log level
//! - [`AhdConfig`] / [`RetryConfig`] - Health Discovery connection and retry policy
//! - [`MappingConfig`] - enabled mappers, bundle id strategy
//! - [`FhirConfig`] - identifier namespace, code systems, profiles
//! - [`LoggingConfig`] - file logging

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    Ahd2FhirConfig, AhdConfig, ApplicationConfig, BundleIdMode, FhirConfig, FhirProfilesConfig,
    FhirSystemsConfig, LoggingConfig, MappingConfig, RetryConfig,
};
pub use secret::{mask_secret, secret_string, SecretString, SecretValue};
