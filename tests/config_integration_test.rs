//! Integration tests for configuration loading and validation
//!
//! Tests that touch `AHD2FHIR_*` variables hold `ENV_MUTEX` so they do not
//! observe each other's overrides.

use ahd2fhir::config::{load_config, BundleIdMode};
use ahd2fhir::domain::Ahd2FhirError;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

const OVERRIDES: [&str; 8] = [
    "AHD2FHIR_APPLICATION_LOG_LEVEL",
    "AHD2FHIR_AHD_URL",
    "AHD2FHIR_AHD_PROJECT",
    "AHD2FHIR_AHD_RETRY_MAX_ATTEMPTS",
    "AHD2FHIR_AHD_TLS_VERIFY",
    "AHD2FHIR_MAPPING_ENABLED_MAPPERS",
    "AHD2FHIR_MAPPING_BUNDLE_ID",
    "AHD2FHIR_FHIR_IDENTIFIER_BASE",
];

fn cleanup_env_vars() {
    for name in OVERRIDES {
        std::env::remove_var(name);
    }
    std::env::remove_var("AHD2FHIR_AHD_API_TOKEN");
    std::env::remove_var("AHD2FHIR_AHD_PASSWORD");
    std::env::remove_var("TEST_AHD_TOKEN");
    std::env::remove_var("TEST_AHD_PASSWORD");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const MINIMAL: &str = r#"
[ahd]
url = "https://ahd.example.com/health-discovery"
api_token = "test-token"
"#;

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "debug"

[ahd]
url = "https://ahd.example.com/health-discovery"
username = "nlp"
password = "secret-password"
project = "diz"
pipeline = "befunde"
api_version = "v1"
timeout_seconds = 90
tls_verify = false

[ahd.retry]
max_attempts = 4
fixed_wait_seconds = 1.5
jitter_multiplier = 0.5
jitter_max_seconds = 10

[mapping]
enabled_mappers = ["condition", "smoking_status", "kidney_stone"]
smoking_status_as_value_string = true
bundle_id = "last-composition"

[fhir]
identifier_base = "https://fhir.example.org/identifiers/"

[fhir.systems]
icd_10_gm = "http://fhir.de/CodeSystem/bfarm/icd-10-gm"

[fhir.profiles]
condition = "https://example.org/StructureDefinition/Diagnose"

[logging]
local_enabled = true
local_path = "/tmp/ahd2fhir"
local_rotation = "hourly"
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.ahd.project, "diz");
    assert_eq!(config.ahd.pipeline, "befunde");
    assert_eq!(config.ahd.timeout_seconds, 90);
    assert!(!config.ahd.tls_verify);
    assert!(config.ahd.api_token.is_none());
    assert_eq!(config.ahd.username.as_deref(), Some("nlp"));
    let password: &str = config.ahd.password.as_ref().unwrap().expose_secret().as_ref();
    assert_eq!(password, "secret-password");

    assert_eq!(config.ahd.retry.max_attempts, 4);
    assert_eq!(config.ahd.retry.fixed_wait_seconds, 1.5);
    assert_eq!(config.ahd.retry.jitter_max_seconds, 10.0);

    assert_eq!(
        config.mapping.enabled_mappers,
        vec!["condition", "smoking_status", "kidney_stone"]
    );
    assert!(config.mapping.smoking_status_as_value_string);
    assert_eq!(config.mapping.bundle_id, BundleIdMode::LastComposition);

    assert_eq!(config.fhir.identifier_base, "https://fhir.example.org/identifiers/");
    assert_eq!(
        config.fhir.systems.icd_10_gm,
        "http://fhir.de/CodeSystem/bfarm/icd-10-gm"
    );
    // unspecified entries keep their defaults
    assert_eq!(config.fhir.systems.snomed_ct, "http://snomed.info/sct");
    assert_eq!(
        config.fhir.profiles.condition,
        "https://example.org/StructureDefinition/Diagnose"
    );

    assert!(config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.ahd.api_version, "v1");
    assert!(config.ahd.tls_verify);
    assert_eq!(config.ahd.retry.max_attempts, 10);
    assert_eq!(config.ahd.retry.fixed_wait_seconds, 5.0);
    assert_eq!(config.ahd.retry.jitter_max_seconds, 30.0);
    assert_eq!(
        config.mapping.enabled_mappers,
        vec!["condition", "medication", "medication_list", "device"]
    );
    assert_eq!(config.mapping.bundle_id, BundleIdMode::Auto);
    assert!(!config.logging.local_enabled);
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_AHD_TOKEN", "substituted-token");

    let file = write_config(
        r#"
[ahd]
url = "https://ahd.example.com/health-discovery"
api_token = "${TEST_AHD_TOKEN}"
"#,
    );
    let config = load_config(file.path()).unwrap();

    let token: &str = config.ahd.api_token.as_ref().unwrap().expose_secret().as_ref();
    assert_eq!(token, "substituted-token");

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[ahd]
url = "https://ahd.example.com/health-discovery"
username = "nlp"
password = "${TEST_AHD_PASSWORD}"
"#,
    );
    let err = load_config(file.path()).unwrap_err();

    assert!(matches!(err, Ahd2FhirError::Configuration(_)));
    assert!(err.to_string().contains("TEST_AHD_PASSWORD"));
}

#[test]
fn test_env_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("AHD2FHIR_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("AHD2FHIR_AHD_PROJECT", "override-project");
    std::env::set_var("AHD2FHIR_AHD_RETRY_MAX_ATTEMPTS", "2");
    std::env::set_var("AHD2FHIR_AHD_TLS_VERIFY", "false");
    std::env::set_var("AHD2FHIR_MAPPING_ENABLED_MAPPERS", "condition, device");
    std::env::set_var("AHD2FHIR_MAPPING_BUNDLE_ID", "random");

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.ahd.project, "override-project");
    assert_eq!(config.ahd.retry.max_attempts, 2);
    assert!(!config.ahd.tls_verify);
    assert_eq!(config.mapping.enabled_mappers, vec!["condition", "device"]);
    assert_eq!(config.mapping.bundle_id, BundleIdMode::Random);

    cleanup_env_vars();
}

#[test]
fn test_invalid_bundle_id_override() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("AHD2FHIR_MAPPING_BUNDLE_ID", "sequential");

    let file = write_config(MINIMAL);
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("sequential"));

    cleanup_env_vars();
}

#[test]
fn test_override_is_validated() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("AHD2FHIR_AHD_URL", "ftp://ahd.example.com");

    let file = write_config(MINIMAL);
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("http"));

    cleanup_env_vars();
}

#[test]
fn test_validation_errors() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        (
            r#"
[ahd]
url = "https://ahd.example.com"
"#,
            "api_token",
        ),
        (
            r#"
[ahd]
url = "https://ahd.example.com"
api_token = "t"

[mapping]
enabled_mappers = ["condition", "procedure"]
"#,
            "procedure",
        ),
        (
            r#"
[ahd]
url = "https://ahd.example.com"
api_token = "t"

[ahd.retry]
max_attempts = 0
"#,
            "max_attempts",
        ),
        (
            r#"
[application]
log_level = "verbose"

[ahd]
url = "https://ahd.example.com"
api_token = "t"
"#,
            "log_level",
        ),
        (
            r#"
[ahd]
url = "https://ahd.example.com"
api_token = "t"

[logging]
local_rotation = "size"
"#,
            "local_rotation",
        ),
    ];

    for (contents, expected) in cases {
        let file = write_config(contents);
        let err = load_config(file.path()).unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "expected '{expected}' in: {err}"
        );
    }
}

#[test]
fn test_invalid_toml() {
    let file = write_config("[ahd\nurl = ");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/ahd2fhir.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
