//! Averbis Health Discovery adapter
//!
//! The [`TextAnalyzer`] trait is the seam the resource handler depends on;
//! [`AhdClient`] implements it against the Health Discovery REST API.

mod analyzer;
pub mod client;
pub mod models;

pub use analyzer::TextAnalyzer;
pub use client::AhdClient;
pub use models::AnalysisResponse;
