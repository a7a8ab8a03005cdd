// ahd2fhir - Averbis Health Discovery annotations to FHIR
// Copyright (c) 2025 ahd2fhir Contributors
// Licensed under the MIT License

//! # ahd2fhir - Averbis Health Discovery to FHIR
//!
//! ahd2fhir sends clinical documents to an Averbis Health Discovery NLP pipeline
//! and maps the returned annotations to FHIR R4 resources, delivered as one
//! transaction bundle per request.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Extracting** the text of `DocumentReference` attachments
//! - **Analysing** it with Health Discovery, retrying transient failures
//! - **Mapping** diagnoses, medications, smoking status and kidney stone findings
//!   to `Condition`, `Medication`, `MedicationStatement`, `List`, `Observation`
//!   and `Device` resources with deterministic ids
//! - **Bundling** them, indexed by one `Composition` per document, as `PUT` entries
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (handler, mappers, composition, bundle)
//! - [`adapters`] - External integrations (Health Discovery)
//! - [`domain`] - Annotations, errors and identifiers
//! - [`fhir`] - Minimal FHIR R4 model
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ahd2fhir::config::load_config;
//! use ahd2fhir::core::handler::ResourceHandler;
//! use ahd2fhir::fhir::Bundle;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("ahd2fhir.toml")?;
//!     let handler = ResourceHandler::from_config(&config)?;
//!
//!     let input: Bundle = serde_json::from_str(&std::fs::read_to_string("documents.json")?)?;
//!     let output = handler.handle_bundle(&input).await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&output)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`]. Callers branch on
//! [`domain::Ahd2FhirError::kind`] to tell a bad document from an unavailable
//! NLP service:
//!
//! ```rust
//! use ahd2fhir::domain::{Ahd2FhirError, ErrorKind};
//!
//! let err = Ahd2FhirError::InvalidInput("Document d1 contains no valid content".into());
//! assert_eq!(err.kind(), ErrorKind::InvalidInput);
//! ```
//!
//! ## Custom Text Analysis
//!
//! The handler depends only on [`adapters::ahd::TextAnalyzer`], so any
//! implementation (a recorded fixture, another NLP backend) can be plugged in
//! with [`core::handler::ResourceHandler::new`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod fhir;
pub mod logging;
