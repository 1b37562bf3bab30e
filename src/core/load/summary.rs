//! Ingest summary and reporting
//!
//! Tracks per-resource-type outcomes of a run and renders them as
//! structured log events.

use crate::domain::{ResourceType, StrandError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome counters of one resource type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Records skipped for a missing required field
    pub skipped: usize,
    /// Records built but not sent because of dry run
    pub dry_run: usize,
}

impl TypeCounts {
    pub fn submitted(&self) -> usize {
        self.created + self.updated
    }

    fn merge(&mut self, other: &TypeCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.dry_run += other.dry_run;
    }
}

/// Summary of an ingest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Studies extracted and transformed
    pub studies_processed: usize,

    /// Outcome counters per resource type
    pub counts: BTreeMap<ResourceType, TypeCounts>,

    /// Errors encountered during the run
    pub errors: Vec<IngestError>,

    /// Duration of the run
    pub duration: Duration,

    /// Set when a shutdown signal stopped the run early
    pub interrupted: bool,
}

impl IngestSummary {
    /// Create a new empty summary stamped with the current time
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ..Self::default()
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Counters of one resource type, created on first use
    pub fn counts_mut(&mut self, resource_type: ResourceType) -> &mut TypeCounts {
        self.counts.entry(resource_type).or_default()
    }

    /// Add an error
    pub fn add_error(&mut self, error: IngestError) {
        self.errors.push(error);
    }

    /// Folds another summary (e.g. of one study) into this one
    pub fn merge(&mut self, other: IngestSummary) {
        self.studies_processed += other.studies_processed;
        for (resource_type, counts) in &other.counts {
            self.counts_mut(*resource_type).merge(counts);
        }
        self.errors.extend(other.errors);
        self.interrupted |= other.interrupted;
    }

    pub fn total_submitted(&self) -> usize {
        self.counts.values().map(TypeCounts::submitted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.counts.values().map(|c| c.failed).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.counts.values().map(|c| c.skipped).sum()
    }

    /// Check if the run was successful (no failures)
    pub fn is_successful(&self) -> bool {
        self.total_failed() == 0 && self.errors.is_empty()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            started_at = %self.started_at.to_rfc3339(),
            studies = self.studies_processed,
            submitted = self.total_submitted(),
            failed = self.total_failed(),
            skipped = self.total_skipped(),
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            "Ingest summary"
        );

        for (resource_type, counts) in &self.counts {
            tracing::info!(
                resource_type = %resource_type,
                created = counts.created,
                updated = counts.updated,
                failed = counts.failed,
                skipped = counts.skipped,
                dry_run = counts.dry_run,
                "Resource type summary"
            );
        }

        if !self.errors.is_empty() {
            tracing::warn!(error_count = self.errors.len(), "Ingest completed with errors");
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    context = error.context.as_deref().unwrap_or(""),
                    "Ingest error"
                );
            }
        }
    }
}

/// Type of ingest error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestErrorType {
    /// Source of record could not be read or is inconsistent
    Source,
    /// FHIR search failed or returned an inconsistent result
    Query,
    /// More than one remote resource matched a natural key
    Ambiguous,
    /// The FHIR server refused a submission
    Rejected,
    /// File metadata could not be resolved
    FileMetadata,
    /// Diagnostic dump could not be written
    Output,
    Unknown,
}

impl IngestErrorType {
    /// Classifies a per-record error
    pub fn of(error: &StrandError) -> Self {
        use crate::domain::FhirError;
        match error {
            StrandError::Source(_) => IngestErrorType::Source,
            StrandError::Fhir(FhirError::AmbiguousMatch { .. }) => IngestErrorType::Ambiguous,
            StrandError::Fhir(FhirError::Rejected { .. }) => IngestErrorType::Rejected,
            StrandError::Fhir(_) => IngestErrorType::Query,
            StrandError::FileMetadata(_) => IngestErrorType::FileMetadata,
            StrandError::Io(_) => IngestErrorType::Output,
            _ => IngestErrorType::Unknown,
        }
    }
}

/// Ingest error with context
#[derive(Debug, Clone, Serialize)]
pub struct IngestError {
    /// Type of error
    pub error_type: IngestErrorType,

    /// Error message, including request and response bodies for rejections
    pub message: String,

    /// Resource type, natural key or study id involved
    pub context: Option<String>,
}

impl IngestError {
    pub fn new(error_type: IngestErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            context: None,
        }
    }

    /// Builds an error entry from a domain error
    pub fn from_error(error: &StrandError) -> Self {
        Self::new(IngestErrorType::of(error), error.to_string())
    }

    /// Add context to the error
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}
