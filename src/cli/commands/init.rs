//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::{EXIT_CONFIGURATION, EXIT_FATAL, EXIT_SUCCESS};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "ahd2fhir.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing ahd2fhir configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIGURATION);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your Health Discovery settings", self.output);
                println!("  2. Create a .env file with AHD2FHIR_AHD_API_TOKEN=<token>");
                println!("     (or set ahd.username and AHD2FHIR_AHD_PASSWORD)");
                println!("  3. Validate configuration: ahd2fhir validate-config --check-connection");
                println!("  4. Analyse a document: ahd2fhir analyze document.json --pretty");
                println!();
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# ahd2fhir Configuration File
# Averbis Health Discovery annotations to FHIR

[application]
log_level = "info"

[ahd]
url = "https://ahd.example.com/health-discovery"
api_token = "${AHD2FHIR_AHD_API_TOKEN}"
project = "default"
pipeline = "discharge"

[mapping]
enabled_mappers = ["condition", "medication", "medication_list", "device"]
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# ahd2fhir Configuration File
# Averbis Health Discovery annotations to FHIR
#
# Values of the form ${VAR_NAME} are read from the environment (or a .env
# file). Every key can also be overridden with AHD2FHIR_<SECTION>_<KEY>,
# e.g. AHD2FHIR_AHD_URL.

[application]
# trace | debug | info | warn | error
log_level = "info"

[ahd]
# Base URL of the Health Discovery installation
url = "https://ahd.example.com/health-discovery"

# Authentication: either an API token ...
api_token = "${AHD2FHIR_AHD_API_TOKEN}"
# ... or basic authentication
# username = "ahd2fhir"
# password = "${AHD2FHIR_AHD_PASSWORD}"

project = "default"
pipeline = "discharge"
api_version = "v1"

# Per-request timeout
timeout_seconds = 60

# Only disable against test servers with self-signed certificates
tls_verify = true

[ahd.retry]
# Total attempts per document, including the first
max_attempts = 10
# Wait before attempt n+1: fixed + random(0, min(jitter_max, multiplier * 2^(n-1)))
fixed_wait_seconds = 5.0
jitter_multiplier = 1.0
jitter_max_seconds = 30.0

[mapping]
# Available: condition, medication, medication_list, device, smoking_status, kidney_stone
enabled_mappers = ["condition", "medication", "medication_list", "device"]

# Emit the smoking status as valueString instead of a coded value
smoking_status_as_value_string = false

# Bundle id: auto | last-composition | random
#   auto             - composition id for a single document, random otherwise
#   last-composition - composition id of the last document
#   random           - always a fresh UUID
bundle_id = "auto"

[fhir]
# Namespace of every identifier system
identifier_base = "https://fhir.miracum.org/nlp/identifiers/"

[fhir.systems]
icd_10_gm = "http://fhir.de/CodeSystem/dimdi/icd-10-gm"
snomed_ct = "http://snomed.info/sct"
condition_clinical_status = "http://terminology.hl7.org/CodeSystem/condition-clinical"
ucum = "http://unitsofmeasure.org"
atc = "http://fhir.de/CodeSystem/dimdi/atc"
rxnorm = "http://www.nlm.nih.gov/research/umls/rxnorm"
loinc = "http://loinc.org"

[fhir.profiles]
condition = "https://www.medizininformatik-initiative.de/fhir/core/modul-diagnose/StructureDefinition/Diagnose"
medication = "https://www.medizininformatik-initiative.de/fhir/core/modul-medikation/StructureDefinition/Medication"
medication_statement = "https://www.medizininformatik-initiative.de/fhir/core/modul-medikation/StructureDefinition/MedicationStatement"
observation = "https://www.medizininformatik-initiative.de/fhir/core/StructureDefinition/Observation"
medication_list = "https://gematik.de/fhir/isik/v3/Medikation/StructureDefinition/ISiKMedikationsListe"

[logging]
# JSON log files in addition to console output
local_enabled = false
local_path = "/var/log/ahd2fhir"
# daily | hourly
local_rotation = "daily"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn without_placeholders(config: String) -> String {
        config.replace("${AHD2FHIR_AHD_API_TOKEN}", "token")
    }

    #[test]
    fn test_generate_minimal_config_parses() {
        let config = parse_config(&without_placeholders(InitArgs::generate_minimal_config()))
            .unwrap();
        assert_eq!(config.ahd.pipeline, "discharge");
        assert_eq!(config.mapping.enabled_mappers.len(), 4);
    }

    #[test]
    fn test_generate_config_with_examples_parses() {
        let content = InitArgs::generate_config_with_examples();
        assert!(content.contains("[ahd.retry]"));
        assert!(content.contains("[fhir.profiles]"));

        let config = parse_config(&without_placeholders(content)).unwrap();
        assert_eq!(config.ahd.retry.max_attempts, 10);
    }

    #[tokio::test]
    async fn test_does_not_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ahd2fhir.toml");
        fs::write(&path, "keep me").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_CONFIGURATION);
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");

        let forced = InitArgs { force: true, ..args };
        assert_eq!(forced.execute().await.unwrap(), EXIT_SUCCESS);
        assert!(fs::read_to_string(&path).unwrap().contains("[ahd]"));
    }
}
