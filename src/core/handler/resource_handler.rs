//! Root orchestrator: documents in, transaction bundle out

use super::retry::RetryPolicy;
use super::text::DocumentText;
use crate::adapters::ahd::{AhdClient, TextAnalyzer};
use crate::config::{Ahd2FhirConfig, BundleIdMode};
use crate::core::bundle::BundleBuilder;
use crate::core::composition::CompositionBuilder;
use crate::core::mapping::{MapperHandler, MapperRegistry, MappingSettings};
use crate::core::metrics::PipelineMetrics;
use crate::domain::{Annotation, Result};
use crate::fhir::{Bundle, DocumentReference, Resource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Turns clinical documents into a FHIR transaction bundle
///
/// Each document is processed to completion before the next one starts:
/// text extraction, text analysis (retried), mapping and composition. The
/// handler holds no mutable state, so one instance can serve concurrent
/// requests behind an `Arc`.
///
/// # Example
///
/// ```no_run
/// use ahd2fhir::config::load_config;
/// use ahd2fhir::core::handler::ResourceHandler;
/// use ahd2fhir::fhir::DocumentReference;
///
/// # async fn example(doc: DocumentReference) -> ahd2fhir::domain::Result<()> {
/// let config = load_config("ahd2fhir.toml")?;
/// let handler = ResourceHandler::from_config(&config)?;
///
/// let bundle = handler.handle_documents(&[doc]).await?;
/// println!("{} entries", bundle.entry.len());
/// # Ok(())
/// # }
/// ```
pub struct ResourceHandler {
    analyzer: Arc<dyn TextAnalyzer>,
    mapper: MapperHandler,
    settings: Arc<MappingSettings>,
    retry: RetryPolicy,
    composition_date: Option<DateTime<Utc>>,
    bundle_id_mode: BundleIdMode,
    metrics: Arc<PipelineMetrics>,
}

impl ResourceHandler {
    pub fn new(analyzer: Arc<dyn TextAnalyzer>, registry: MapperRegistry) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        Self {
            analyzer,
            mapper: MapperHandler::new(registry, Arc::clone(&metrics)),
            settings: Arc::new(MappingSettings::default()),
            retry: RetryPolicy::default(),
            composition_date: None,
            bundle_id_mode: BundleIdMode::default(),
            metrics,
        }
    }

    /// Builds the application context: Health Discovery client, enabled
    /// mappers, retry policy and bundle id strategy
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn from_config(config: &Ahd2FhirConfig) -> Result<Self> {
        let client = AhdClient::new(&config.ahd)?;
        let settings = Arc::new(MappingSettings::from_config(config));

        let registry = MapperRegistry::with_defaults(Arc::clone(&settings))
            .filtered(&config.mapping.enabled_mappers);
        if registry.is_empty() {
            tracing::warn!("No mappers enabled, bundles will only contain compositions");
        }

        tracing::info!(
            mappers = ?registry.names(),
            project = %config.ahd.project,
            pipeline = %config.ahd.pipeline,
            "Resource handler ready"
        );

        Ok(Self::new(Arc::new(client), registry)
            .with_settings(settings)
            .with_retry_policy(RetryPolicy::from_config(&config.ahd.retry))
            .with_bundle_id_mode(config.mapping.bundle_id))
    }

    /// Identifier namespace, code systems and profiles of the composition
    pub fn with_settings(mut self, settings: Arc<MappingSettings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stamps every composition with `date` instead of the wall clock
    pub fn with_composition_date(mut self, date: DateTime<Utc>) -> Self {
        self.composition_date = Some(date);
        self
    }

    pub fn with_bundle_id_mode(mut self, mode: BundleIdMode) -> Self {
        self.bundle_id_mode = mode;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.mapper = self.mapper.with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn registry(&self) -> &MapperRegistry {
        self.mapper.registry()
    }

    /// Processes `documents` in order and bundles every resource produced
    ///
    /// # Errors
    ///
    /// - [`InvalidInput`](crate::domain::Ahd2FhirError::InvalidInput) for a
    ///   malformed document, raised before its text is sent for analysis
    /// - [`TransientUpstream`](crate::domain::Ahd2FhirError::TransientUpstream)
    ///   when text analysis keeps failing
    pub async fn handle_documents(&self, documents: &[DocumentReference]) -> Result<Bundle> {
        let mut total = Vec::new();
        let mut composition_ids = Vec::with_capacity(documents.len());

        for doc in documents {
            let resources = self.process_document(doc).await?;
            let composition = self.composition_builder().build(doc, &resources);

            composition_ids.push(composition.id.clone());
            total.extend(resources);
            total.push(Resource::Composition(composition));
        }

        let bundle_id = match self.bundle_id_mode {
            BundleIdMode::Auto if composition_ids.len() == 1 => composition_ids.pop(),
            BundleIdMode::Auto | BundleIdMode::Random => None,
            BundleIdMode::LastComposition => composition_ids.pop(),
        };

        Ok(BundleBuilder::new().build(total, bundle_id))
    }

    /// Processes the `DocumentReference` entries of `bundle`, ignoring all others
    pub async fn handle_bundle(&self, bundle: &Bundle) -> Result<Bundle> {
        let documents: Vec<DocumentReference> = bundle
            .resources()
            .filter_map(|resource| match resource {
                Resource::DocumentReference(doc) => Some(doc.clone()),
                _ => None,
            })
            .collect();

        let skipped = bundle.entry.len() - documents.len();
        if skipped > 0 {
            tracing::debug!(skipped, "Ignoring bundle entries that are not DocumentReferences");
        }

        self.handle_documents(&documents).await
    }

    async fn process_document(&self, doc: &DocumentReference) -> Result<Vec<Resource>> {
        let started = Instant::now();
        let document = format!("DocumentReference/{}", doc.id.as_deref().unwrap_or_default());

        let text = DocumentText::extract(doc)?;
        self.metrics.record_document(text.text.chars().count());

        let annotations = self.analyse(&text).await.map_err(|e| {
            crate::log_error_with_context!(&e, document.as_str());
            e
        })?;
        let resources = self.mapper.map_document(&annotations, doc);

        crate::log_document_processed!(document, resources.len(), started.elapsed());
        Ok(resources)
    }

    async fn analyse(&self, text: &DocumentText) -> Result<Vec<Annotation>> {
        let annotation_types = self.mapper.registry().annotation_types();
        let language = text.language.as_deref();
        let html = text.is_html();

        self.retry
            .run(|attempt| {
                self.metrics.record_analysis_attempt();
                tracing::debug!(attempt, html, "Calling text analysis");

                let analyzer = &self.analyzer;
                let annotation_types = annotation_types.as_str();
                async move {
                    if html {
                        analyzer
                            .analyse_html(&text.text, language, annotation_types)
                            .await
                    } else {
                        analyzer
                            .analyse_text(&text.text, language, annotation_types)
                            .await
                    }
                }
            })
            .await
    }

    fn composition_builder(&self) -> CompositionBuilder {
        let builder = CompositionBuilder::new(Arc::clone(&self.settings));
        match self.composition_date {
            Some(date) => builder.with_fixed_date(date),
            None => builder,
        }
    }
}
