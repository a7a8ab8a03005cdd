//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{Ahd2FhirConfig, BundleIdMode};
use super::secret::secret_string;
use crate::domain::errors::Ahd2FhirError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Substitutes `${VAR}` placeholders from the environment
/// 3. Parses the TOML into [`Ahd2FhirConfig`]
/// 4. Applies `AHD2FHIR_*` environment variable overrides
/// 5. Validates the result
///
/// # Errors
///
/// Returns [`Ahd2FhirError::Configuration`] if the file is missing or unreadable,
/// a referenced variable is unset, the TOML is invalid, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use ahd2fhir::config::loader::load_config;
///
/// let config = load_config("ahd2fhir.toml").expect("Failed to load config");
/// println!("{}", config.ahd.url);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<Ahd2FhirConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Ahd2FhirError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        Ahd2FhirError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Same as [`load_config`] but from an in-memory TOML document
pub fn parse_config(contents: &str) -> Result<Ahd2FhirConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: Ahd2FhirConfig = toml::from_str(&contents)
        .map_err(|e| Ahd2FhirError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        Ahd2FhirError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied verbatim so that documented placeholders in
/// comments don't have to be set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| {
                if !missing_vars.iter().any(|v| v == var_name) {
                    missing_vars.push(var_name.to_string());
                }
                String::new()
            })
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(Ahd2FhirError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the AHD2FHIR_* prefix
///
/// Variables follow the pattern `AHD2FHIR_<SECTION>_<KEY>`, for example
/// `AHD2FHIR_AHD_URL` or `AHD2FHIR_MAPPING_ENABLED_MAPPERS` (comma separated).
fn apply_env_overrides(config: &mut Ahd2FhirConfig) -> Result<()> {
    if let Ok(val) = std::env::var("AHD2FHIR_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Health Discovery overrides
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_URL") {
        config.ahd.url = val;
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_API_TOKEN") {
        config.ahd.api_token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_USERNAME") {
        config.ahd.username = Some(val);
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_PASSWORD") {
        config.ahd.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_PROJECT") {
        config.ahd.project = val;
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_PIPELINE") {
        config.ahd.pipeline = val;
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_TLS_VERIFY") {
        config.ahd.tls_verify = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.ahd.timeout_seconds = timeout;
        }
    }
    if let Ok(val) = std::env::var("AHD2FHIR_AHD_RETRY_MAX_ATTEMPTS") {
        if let Ok(attempts) = val.parse() {
            config.ahd.retry.max_attempts = attempts;
        }
    }

    // Mapping overrides
    if let Ok(val) = std::env::var("AHD2FHIR_MAPPING_ENABLED_MAPPERS") {
        config.mapping.enabled_mappers = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Ok(val) = std::env::var("AHD2FHIR_MAPPING_SMOKING_STATUS_AS_VALUE_STRING") {
        config.mapping.smoking_status_as_value_string =
            matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }
    if let Ok(val) = std::env::var("AHD2FHIR_MAPPING_BUNDLE_ID") {
        config.mapping.bundle_id = match val.as_str() {
            "auto" => BundleIdMode::Auto,
            "last-composition" => BundleIdMode::LastComposition,
            "random" => BundleIdMode::Random,
            other => {
                return Err(Ahd2FhirError::Configuration(format!(
                    "Invalid AHD2FHIR_MAPPING_BUNDLE_ID '{other}'. Must be one of: auto, last-composition, random"
                )))
            }
        };
    }

    if let Ok(val) = std::env::var("AHD2FHIR_FHIR_IDENTIFIER_BASE") {
        config.fhir.identifier_base = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("AHD2FHIR_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("AHD2FHIR_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
