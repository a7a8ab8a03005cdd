//! Analyze command implementation
//!
//! Reads a FHIR `DocumentReference` or `Bundle` as JSON, runs it through the
//! resource handler and writes the resulting transaction bundle. The bundle is
//! the only thing written to stdout; progress goes to stderr.

use super::{exit_code, EXIT_CONFIGURATION, EXIT_INVALID_INPUT, EXIT_SUCCESS};
use crate::config::load_config;
use crate::core::handler::ResourceHandler;
use crate::domain::{Ahd2FhirError, Result};
use crate::fhir::{Bundle, DocumentReference};
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::Value;
use std::io::Read;

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// JSON file with a DocumentReference or a Bundle, `-` for stdin
    pub input: String,

    /// Write the bundle to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Pretty-print the bundle
    #[arg(long)]
    pub pretty: bool,

    /// Fixed composition date (RFC 3339) for reproducible output
    #[arg(long, value_name = "RFC3339")]
    pub composition_date: Option<DateTime<Utc>>,
}

/// Parsed command input
#[derive(Debug)]
pub enum AnalyzeInput {
    Document(Box<DocumentReference>),
    Bundle(Bundle),
}

impl AnalyzeInput {
    /// Parses a JSON document, dispatching on `resourceType`
    pub fn parse(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|e| Ahd2FhirError::InvalidInput(format!("Input is not valid JSON: {e}")))?;

        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let invalid = |e: serde_json::Error| {
            Ahd2FhirError::InvalidInput(format!("Input is not a valid {resource_type}: {e}"))
        };

        match resource_type.as_str() {
            "DocumentReference" => serde_json::from_value(value)
                .map(|doc| AnalyzeInput::Document(Box::new(doc)))
                .map_err(invalid),
            "Bundle" => serde_json::from_value(value)
                .map(AnalyzeInput::Bundle)
                .map_err(invalid),
            "" => Err(Ahd2FhirError::InvalidInput(
                "Input has no resourceType".to_string(),
            )),
            other => Err(Ahd2FhirError::InvalidInput(format!(
                "Expected a DocumentReference or Bundle, got {other}"
            ))),
        }
    }
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input, "Starting analyze command");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(EXIT_CONFIGURATION);
            }
        };

        let input = match self.read_input().and_then(|c| AnalyzeInput::parse(&c)) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(EXIT_INVALID_INPUT);
            }
        };

        let mut handler = match ResourceHandler::from_config(&config) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(exit_code(&e));
            }
        };
        if let Some(date) = self.composition_date {
            handler = handler.with_composition_date(date);
        }

        let result = match &input {
            AnalyzeInput::Document(doc) => {
                handler
                    .handle_documents(std::slice::from_ref(doc.as_ref()))
                    .await
            }
            AnalyzeInput::Bundle(bundle) => handler.handle_bundle(bundle).await,
        };

        let bundle = match result {
            Ok(bundle) => bundle,
            Err(e) => {
                crate::log_error_with_context!(&e, "Analysis failed");
                eprintln!("❌ {e}");
                return Ok(exit_code(&e));
            }
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&bundle)?
        } else {
            serde_json::to_string(&bundle)?
        };

        match &self.output {
            Some(path) => {
                std::fs::write(path, json)?;
                eprintln!("✅ Wrote {} entries to {path}", bundle.entry.len());
            }
            None => println!("{json}"),
        }

        let metrics = handler.metrics().snapshot();
        tracing::info!(
            documents = metrics.documents_processed,
            resources = metrics.resources_extracted,
            mapping_failures = metrics.mapping_failures,
            analysis_attempts = metrics.analysis_attempts,
            "Analyze command finished"
        );

        Ok(EXIT_SUCCESS)
    }

    fn read_input(&self) -> Result<String> {
        if self.input == "-" {
            let mut contents = String::new();
            std::io::stdin().read_to_string(&mut contents)?;
            return Ok(contents);
        }

        std::fs::read_to_string(&self.input).map_err(|e| {
            Ahd2FhirError::InvalidInput(format!("Failed to read {}: {e}", self.input))
        })
    }
}
