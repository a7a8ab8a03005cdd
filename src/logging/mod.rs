//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with configurable log levels
//! - JSON-formatted local file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use ahd2fhir::logging::init_logging;
//! use ahd2fhir::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log an annotation a mapper deliberately produced nothing for
///
/// # Example
///
/// ```no_run
/// use ahd2fhir::log_annotation_dropped;
///
/// let annotation_id: Option<String> = Some("42".to_string());
/// log_annotation_dropped!("condition", annotation_id, "negated");
/// ```
#[macro_export]
macro_rules! log_annotation_dropped {
    ($mapper:expr, $annotation_id:expr, $reason:expr) => {
        tracing::warn!(
            mapper = $mapper,
            annotation_id = ?$annotation_id,
            reason = $reason,
            "Dropped annotation"
        );
    };
}

/// Log the completion of one document
///
/// # Example
///
/// ```no_run
/// use ahd2fhir::log_document_processed;
/// use std::time::Duration;
///
/// log_document_processed!("DocumentReference/doc-1", 12, Duration::from_millis(850));
/// ```
#[macro_export]
macro_rules! log_document_processed {
    ($document:expr, $resources:expr, $duration:expr) => {
        tracing::info!(
            document = %$document,
            resources = $resources,
            duration_ms = $duration.as_millis() as u64,
            "Document processed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use ahd2fhir::log_error_with_context;
/// use ahd2fhir::domain::Ahd2FhirError;
///
/// let error = Ahd2FhirError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use ahd2fhir::log_retry_attempt;
/// use std::time::Duration;
///
/// log_retry_attempt!(2, 10, Duration::from_secs(6), "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $delay:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            delay_ms = $delay.as_millis() as u64,
            reason = %$reason,
            "Retrying text analysis"
        );
    };
}
