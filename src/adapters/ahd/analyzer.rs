//! Text analysis trait definition
//!
//! `TextAnalyzer` abstracts the Averbis Health Discovery REST API so that the
//! resource handler can be driven by the real client in production and by an
//! in-memory double in tests.

use crate::domain::{AhdError, Annotation};
use async_trait::async_trait;

/// Runs an NLP pipeline over a document text
///
/// Implementations must be stateless per call; one instance is shared by all
/// concurrent requests.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Analyses plain text
    ///
    /// # Arguments
    ///
    /// * `text` - Decoded document text
    /// * `language` - Two-letter language code, `None` lets the pipeline decide
    /// * `annotation_types` - Comma-joined annotation type names to return
    async fn analyse_text(
        &self,
        text: &str,
        language: Option<&str>,
        annotation_types: &str,
    ) -> Result<Vec<Annotation>, AhdError>;

    /// Analyses an HTML document
    async fn analyse_html(
        &self,
        html: &str,
        language: Option<&str>,
        annotation_types: &str,
    ) -> Result<Vec<Annotation>, AhdError>;
}
