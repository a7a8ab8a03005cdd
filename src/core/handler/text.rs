//! Text extraction from `DocumentReference` attachments

use crate::domain::{Ahd2FhirError, Result};
use crate::fhir::DocumentReference;
use base64::{engine::general_purpose, Engine as _};

const HTML_CONTENT_TYPE: &str = "text/html";

/// Decoded text of the single attachment of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    pub content_type: String,
    /// Primary language subtag, lower-cased (`de-DE` becomes `de`)
    pub language: Option<String>,
}

impl DocumentText {
    pub fn is_html(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().eq_ignore_ascii_case(HTML_CONTENT_TYPE))
            .unwrap_or(false)
    }

    /// Extracts the text of `doc`
    ///
    /// # Errors
    ///
    /// [`Ahd2FhirError::InvalidInput`] when the document does not have exactly one
    /// attachment with data, the attachment has no content type, or the data is
    /// not base64-encoded UTF-8.
    pub fn extract(doc: &DocumentReference) -> Result<Self> {
        let document_id = doc.id.as_deref().unwrap_or("(no id)");

        let mut with_data = doc
            .content
            .iter()
            .map(|c| &c.attachment)
            .filter(|a| a.data.is_some());

        let (Some(attachment), rest) = (with_data.next(), with_data.count()) else {
            return Err(Ahd2FhirError::InvalidInput(format!(
                "Document {document_id} contains no valid content"
            )));
        };
        if rest > 0 {
            return Err(Ahd2FhirError::InvalidInput(format!(
                "Document {document_id} contains more than one attachment"
            )));
        }

        let content_type = attachment
            .content_type
            .clone()
            .filter(|ct| !ct.trim().is_empty())
            .ok_or_else(|| {
                Ahd2FhirError::InvalidInput(format!(
                    "Document {document_id} attachment has no content type"
                ))
            })?;

        let data = attachment.data.as_deref().unwrap_or_default();
        let bytes = general_purpose::STANDARD.decode(data.trim()).map_err(|e| {
            Ahd2FhirError::InvalidInput(format!(
                "Document {document_id} attachment is not valid base64: {e}"
            ))
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            Ahd2FhirError::InvalidInput(format!(
                "Document {document_id} attachment is not valid UTF-8: {e}"
            ))
        })?;

        let language = attachment
            .language
            .as_deref()
            .and_then(|l| l.split('-').next())
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty());

        Ok(Self {
            text,
            content_type,
            language,
        })
    }
}
