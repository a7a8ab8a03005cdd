//! External system integrations for ahd2fhir.
//!
//! - [`ahd`] - Averbis Health Discovery text analysis
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with mock implementations. The resource handler only sees the
//! [`ahd::TextAnalyzer`] trait.
//!
//! ```rust,no_run
//! use ahd2fhir::adapters::ahd::AhdClient;
//! use ahd2fhir::config::{secret_string, AhdConfig, RetryConfig};
//!
//! # fn example() -> ahd2fhir::domain::Result<()> {
//! let config = AhdConfig {
//!     url: "https://ahd.example.com/health-discovery".to_string(),
//!     api_token: Some(secret_string("token".to_string())),
//!     username: None,
//!     password: None,
//!     project: "nlp".to_string(),
//!     pipeline: "discharge".to_string(),
//!     api_version: "v1".to_string(),
//!     timeout_seconds: 60,
//!     tls_verify: true,
//!     retry: RetryConfig::default(),
//! };
//! let client = AhdClient::new(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod ahd;
