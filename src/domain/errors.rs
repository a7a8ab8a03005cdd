//! Domain error types
//!
//! This module defines the error hierarchy for ahd2fhir. Errors are domain-specific
//! and don't expose third-party types; HTTP client and parser errors are converted
//! to strings at the boundary.

use thiserror::Error;

/// Closed classification of every error the pipeline can surface to a caller
///
/// Callers (the CLI, an HTTP layer or a message consumer) branch on this instead
/// of inspecting concrete error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source document is malformed; retrying will not help
    InvalidInput,

    /// The NLP service kept failing until the retry budget was exhausted
    TransientUpstreamFailure,

    /// Anything else
    Unexpected,
}

/// Main ahd2fhir error type
#[derive(Debug, Error)]
pub enum Ahd2FhirError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed source document
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Averbis Health Discovery errors from a single call
    #[error("Text analysis error: {0}")]
    Ahd(#[from] AhdError),

    /// The text analysis call failed on every attempt
    #[error("Text analysis unavailable after {attempts} attempts: {source}")]
    TransientUpstream {
        attempts: u32,
        #[source]
        source: AhdError,
    },

    /// Mapping errors that escaped per-annotation isolation
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl Ahd2FhirError {
    /// Classifies this error for callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Ahd2FhirError::InvalidInput(_) => ErrorKind::InvalidInput,
            Ahd2FhirError::TransientUpstream { .. } => ErrorKind::TransientUpstreamFailure,
            _ => ErrorKind::Unexpected,
        }
    }
}

/// Averbis Health Discovery errors
///
/// Errors that occur when talking to the text analysis REST API.
#[derive(Debug, Error)]
pub enum AhdError {
    /// Failed to connect to the server
    #[error("Failed to connect to Health Discovery: {0}")]
    ConnectionFailed(String),

    /// Authentication failed (401/403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid response from server
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// Failures raised by a single mapper for a single annotation
///
/// The mapping orchestrator logs these and counts them; they never abort a document.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The mapper was handed an annotation of a kind it does not handle
    #[error("Mapper '{mapper}' cannot handle annotation type '{actual}'")]
    UnexpectedAnnotation { mapper: &'static str, actual: String },

    /// A field the mapper cannot do without is absent
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but unusable
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl From<std::io::Error> for Ahd2FhirError {
    fn from(err: std::io::Error) -> Self {
        Ahd2FhirError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Ahd2FhirError {
    fn from(err: serde_json::Error) -> Self {
        Ahd2FhirError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Ahd2FhirError {
    fn from(err: toml::de::Error) -> Self {
        Ahd2FhirError::Configuration(format!("TOML parse error: {err}"))
    }
}
