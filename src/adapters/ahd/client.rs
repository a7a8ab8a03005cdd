//! Averbis Health Discovery REST client
//!
//! Talks to a single pipeline of a single project. One client is built at
//! startup and shared by every request; it holds no per-call state.

use super::analyzer::TextAnalyzer;
use super::models::AnalysisResponse;
use crate::config::AhdConfig;
use crate::domain::{Ahd2FhirError, AhdError, Annotation, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

/// Health Discovery client
///
/// # Example
///
/// ```no_run
/// use ahd2fhir::adapters::ahd::{AhdClient, TextAnalyzer};
/// use ahd2fhir::config::parse_config;
///
/// # async fn example() -> ahd2fhir::domain::Result<()> {
/// let config = parse_config(r#"
///     [ahd]
///     url = "https://ahd.example.com/health-discovery"
///     api_token = "secret"
/// "#)?;
/// let client = AhdClient::new(&config.ahd)?;
/// let annotations = client
///     .analyse_text("Patient leidet an Diabetes.", Some("de"), "de.averbis.types.health.Diagnosis")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct AhdClient {
    /// `{url}/rest/{api_version}`
    rest_url: String,

    /// `{rest_url}/textanalysis/projects/{project}/pipelines/{pipeline}`
    pipeline_url: String,

    client: Client,

    config: AhdConfig,
}

impl AhdClient {
    /// Creates a client for the configured project and pipeline
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: &AhdConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification is disabled for Health Discovery");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            Ahd2FhirError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        let rest_url = format!(
            "{}/rest/{}",
            config.url.trim_end_matches('/'),
            config.api_version
        );
        let pipeline_url = format!(
            "{}/textanalysis/projects/{}/pipelines/{}",
            rest_url, config.project, config.pipeline
        );

        Ok(Self {
            rest_url,
            pipeline_url,
            client,
            config: config.clone(),
        })
    }

    /// Server version information, useful as a connectivity check
    pub async fn build_info(&self) -> std::result::Result<Value, AhdError> {
        let url = format!("{}/buildInfo", self.rest_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(transport_error)?;

        let envelope = read_envelope(response).await?;
        Ok(envelope.payload)
    }

    /// Api token header when configured, basic auth otherwise
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self
            .config
            .api_token
            .as_ref()
            .filter(|t| !t.expose_secret().is_empty())
        {
            let token: &str = token.expose_secret().as_ref();
            return request.header("api-token", token);
        }

        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                let password: &str = password.expose_secret().as_ref();
                request.basic_auth(username, Some(password))
            }
            _ => request,
        }
    }

    async fn analyse(
        &self,
        operation: &str,
        content_type: &'static str,
        body: &str,
        language: Option<&str>,
        annotation_types: &str,
    ) -> std::result::Result<Vec<Annotation>, AhdError> {
        let url = format!("{}/{}", self.pipeline_url, operation);

        let mut query: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(language) = language {
            query.push(("language", language));
        }
        query.push(("annotationTypes", annotation_types));

        tracing::debug!(
            operation,
            language = ?language,
            text_chars = body.chars().count(),
            "Sending document to Health Discovery"
        );

        let response = self
            .authorize(self.client.post(&url))
            .query(&query)
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type))
            .body(body.to_owned())
            .send()
            .await
            .map_err(transport_error)?;

        let records = read_envelope(response).await?.into_records();
        tracing::debug!(operation, annotations = records.len(), "Analysis finished");

        Ok(Annotation::from_values(records))
    }
}

#[async_trait]
impl TextAnalyzer for AhdClient {
    async fn analyse_text(
        &self,
        text: &str,
        language: Option<&str>,
        annotation_types: &str,
    ) -> std::result::Result<Vec<Annotation>, AhdError> {
        self.analyse("analyseText", PLAIN_TEXT, text, language, annotation_types)
            .await
    }

    async fn analyse_html(
        &self,
        html: &str,
        language: Option<&str>,
        annotation_types: &str,
    ) -> std::result::Result<Vec<Annotation>, AhdError> {
        self.analyse("analyseHtml", HTML, html, language, annotation_types)
            .await
    }
}

fn transport_error(e: reqwest::Error) -> AhdError {
    if e.is_timeout() {
        AhdError::Timeout(e.to_string())
    } else {
        AhdError::ConnectionFailed(e.to_string())
    }
}

/// Classifies the status and unwraps the response envelope
async fn read_envelope(response: Response) -> std::result::Result<AnalysisResponse, AhdError> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AhdError::AuthenticationFailed(format!("{status}: {message}"))
            }
            s if s.is_client_error() => AhdError::ClientError {
                status: s.as_u16(),
                message,
            },
            s if s.is_server_error() => AhdError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => AhdError::InvalidResponse(format!("Unexpected status {s}: {message}")),
        });
    }

    let envelope: AnalysisResponse = response
        .json()
        .await
        .map_err(|e| AhdError::InvalidResponse(e.to_string()))?;

    if !envelope.error_messages.is_empty() {
        return Err(AhdError::InvalidResponse(envelope.error_messages.join("; ")));
    }

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{secret_string, RetryConfig};

    fn config(url: &str) -> AhdConfig {
        AhdConfig {
            url: url.to_string(),
            api_token: Some(secret_string("token".to_string())),
            username: None,
            password: None,
            project: "nlp".to_string(),
            pipeline: "discharge".to_string(),
            api_version: "v1".to_string(),
            timeout_seconds: 5,
            tls_verify: true,
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn test_urls_are_built_from_config() {
        let client = AhdClient::new(&config("https://ahd.example.com/health-discovery/")).unwrap();
        assert_eq!(
            client.pipeline_url,
            "https://ahd.example.com/health-discovery/rest/v1/textanalysis/projects/nlp/pipelines/discharge"
        );
        assert_eq!(
            client.rest_url,
            "https://ahd.example.com/health-discovery/rest/v1"
        );
    }

    #[test]
    fn test_insecure_client_builds() {
        let mut insecure = config("https://localhost:8443");
        insecure.tls_verify = false;
        assert!(AhdClient::new(&insecure).is_ok());
    }
}
