//! Pipeline counters
//!
//! Lock-free counters shared by every document the handler processes. Each
//! record call also emits a debug event on the `ahd2fhir::metrics` target so the
//! numbers can be scraped from the logs when no other sink is attached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for the mapping pipeline
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    mapping_failures: AtomicU64,
    resources_extracted: AtomicU64,
    analysis_attempts: AtomicU64,
    mapping_duration_micros: AtomicU64,
    document_chars: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub documents_processed: u64,
    pub mapping_failures: u64,
    pub resources_extracted: u64,
    pub analysis_attempts: u64,
    pub mapping_duration: Duration,
    pub document_chars: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapper failed on one annotation
    pub fn record_mapping_failure(&self, mapper: &'static str) {
        self.mapping_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "ahd2fhir::metrics", mapper, "mapping_failure");
    }

    /// Mapping of one document finished
    pub fn record_mapping(&self, duration: Duration, resources: usize) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.mapping_duration_micros
            .fetch_add(micros, Ordering::Relaxed);
        self.resources_extracted
            .fetch_add(resources as u64, Ordering::Relaxed);
        tracing::debug!(
            target: "ahd2fhir::metrics",
            duration_us = micros,
            resources,
            "document_mapped"
        );
    }

    /// A call to the text analysis service is about to be made
    pub fn record_analysis_attempt(&self) {
        self.analysis_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Text of a document was handed to analysis
    pub fn record_document(&self, text_chars: usize) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.document_chars
            .fetch_add(text_chars as u64, Ordering::Relaxed);
        tracing::debug!(target: "ahd2fhir::metrics", text_chars, "document_received");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            mapping_failures: self.mapping_failures.load(Ordering::Relaxed),
            resources_extracted: self.resources_extracted.load(Ordering::Relaxed),
            analysis_attempts: self.analysis_attempts.load(Ordering::Relaxed),
            mapping_duration: Duration::from_micros(
                self.mapping_duration_micros.load(Ordering::Relaxed),
            ),
            document_chars: self.document_chars.load(Ordering::Relaxed),
        }
    }
}
