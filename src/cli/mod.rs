//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for ahd2fhir using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// ahd2fhir - Averbis Health Discovery annotations to FHIR
#[derive(Parser, Debug)]
#[command(name = "ahd2fhir")]
#[command(version, about, long_about = None)]
#[command(author = "ahd2fhir Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ahd2fhir.toml", env = "AHD2FHIR_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "AHD2FHIR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse a DocumentReference or Bundle and print the FHIR transaction bundle
    Analyze(commands::analyze::AnalyzeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
