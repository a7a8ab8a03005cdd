//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the ahd2fhir configuration file.

use super::{EXIT_CONFIGURATION, EXIT_SUCCESS, EXIT_TRANSIENT};
use crate::adapters::ahd::AhdClient;
use crate::config::{load_config, mask_secret, Ahd2FhirConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also call the Health Discovery build info endpoint
    #[arg(long)]
    pub check_connection: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as well
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIGURATION);
            }
        };

        println!();
        print_summary(&config);
        println!();

        if !self.check_connection {
            return Ok(EXIT_SUCCESS);
        }

        println!("🔌 Checking connection to {}", config.ahd.url);
        let client = match AhdClient::new(&config.ahd) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIGURATION);
            }
        };

        match client.build_info().await {
            Ok(info) => {
                println!("✅ Health Discovery reachable");
                if let Some(version) = info.get("specVersion").and_then(|v| v.as_str()) {
                    println!("   Version: {version}");
                }
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("❌ Health Discovery not reachable");
                println!("   Error: {e}");
                Ok(EXIT_TRANSIENT)
            }
        }
    }
}

fn print_summary(config: &Ahd2FhirConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Health Discovery: {}", config.ahd.url);
    println!("  Project: {}", config.ahd.project);
    println!("  Pipeline: {}", config.ahd.pipeline);
    match (&config.ahd.api_token, &config.ahd.username) {
        (Some(token), _) => println!("  Authentication: api token {}", mask_secret(token)),
        (None, Some(username)) => println!("  Authentication: basic ({username})"),
        (None, None) => println!("  Authentication: none"),
    }
    println!(
        "  Retry: {} attempts, {}s fixed wait, jitter up to {}s",
        config.ahd.retry.max_attempts,
        config.ahd.retry.fixed_wait_seconds,
        config.ahd.retry.jitter_max_seconds
    );
    println!("  Mappers: {}", config.mapping.enabled_mappers.join(", "));
    println!("  Bundle Id: {:?}", config.mapping.bundle_id);
    println!("  Identifier Base: {}", config.fhir.identifier_base);
}
