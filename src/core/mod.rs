//! Core business logic for ahd2fhir.
//!
//! # Modules
//!
//! - [`handler`] - Root orchestration, text extraction and retry policy
//! - [`mapping`] - Annotation mappers and the mapper registry
//! - [`composition`] - Per-document `Composition` indexing the mapped resources
//! - [`bundle`] - Transaction bundle assembly
//! - [`metrics`] - Pipeline counters
//!
//! # Workflow
//!
//! For every source document:
//!
//! 1. **Extract**: Decode the single attachment to text
//! 2. **Analyse**: Send the text to Health Discovery, retrying transient failures
//! 3. **Map**: Run every enabled mapper over the returned annotations
//! 4. **Compose**: Index the mapped resources in a `Composition`
//!
//! All resources of all documents are finally wrapped in one transaction bundle.
//!
//! # Example
//!
//! ```rust,no_run
//! use ahd2fhir::config::load_config;
//! use ahd2fhir::core::handler::ResourceHandler;
//! use ahd2fhir::fhir::Bundle;
//!
//! # async fn example(input: Bundle) -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ahd2fhir.toml")?;
//! let handler = ResourceHandler::from_config(&config)?;
//!
//! let output = handler.handle_bundle(&input).await?;
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod composition;
pub mod handler;
pub mod mapping;
pub mod metrics;
