//! Load stage
//!
//! Runs the entity builders of one study against the FHIR server. Resource
//! types are processed one after another in registry order; records of a
//! type are processed concurrently on a bounded pool. For each record the
//! stage computes the natural key, resolves the remote id through the shared
//! cache, builds the payload and submits it.

use super::builders::EntityBuilder;
use super::cache::IdCache;
use super::context::BuildContext;
use super::record::BuilderRecord;
use super::summary::{IngestError, IngestSummary};
use crate::adapters::dataservice::DataserviceApi;
use crate::adapters::drs::FileMetadataResolver;
use crate::adapters::fhir::{FhirClient, SubmitOutcome};
use crate::domain::{MergedStudy, NaturalKey, ResourceType, Result, StrandError};
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// What happened to one record
enum RecordOutcome {
    Submitted(SubmitOutcome),
    DryRun,
}

/// Submits merged studies to the FHIR server
pub struct LoadStage {
    client: Arc<FhirClient>,
    cache: Arc<IdCache>,
    files: Arc<FileMetadataResolver>,
    dataservice: Option<Arc<DataserviceApi>>,
    max_concurrency: usize,
    dry_run: bool,
    shutdown_signal: watch::Receiver<bool>,
}

impl LoadStage {
    pub fn new(
        client: Arc<FhirClient>,
        cache: Arc<IdCache>,
        files: Arc<FileMetadataResolver>,
        dataservice: Option<Arc<DataserviceApi>>,
        max_concurrency: usize,
        dry_run: bool,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            cache,
            files,
            dataservice,
            max_concurrency: max_concurrency.max(1),
            dry_run,
            shutdown_signal,
        }
    }

    /// Runs `builders` over one merged study
    ///
    /// Builders whose resource type is outside the study's target set are
    /// skipped. Per-record failures land in the returned summary.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error (see [`StrandError::is_fatal`]).
    pub async fn run(
        &self,
        merged: &MergedStudy,
        builders: &[Arc<dyn EntityBuilder>],
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::new();
        let ctx = BuildContext::new(
            merged.study_id.clone(),
            self.client.clone(),
            self.cache.clone(),
            self.files.clone(),
            self.dataservice.clone(),
        );

        for builder in builders {
            let resource_type = builder.resource_type();
            if !merged.applies(resource_type) {
                tracing::debug!(
                    study_id = %merged.study_id,
                    resource_type = %resource_type,
                    "No source data for resource type, skipping"
                );
                continue;
            }

            if *self.shutdown_signal.borrow() {
                tracing::warn!(
                    study_id = %merged.study_id,
                    next = %resource_type,
                    "Shutdown requested, not starting further resource types"
                );
                summary.interrupted = true;
                break;
            }

            self.run_builder(builder.as_ref(), merged, &ctx, &mut summary)
                .await?;
        }

        Ok(summary)
    }

    async fn run_builder(
        &self,
        builder: &dyn EntityBuilder,
        merged: &MergedStudy,
        ctx: &BuildContext,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let resource_type = builder.resource_type();
        let records = builder.records(merged);
        summary.counts_mut(resource_type);
        if records.is_empty() {
            return Ok(());
        }

        tracing::info!(
            study_id = %merged.study_id,
            resource_type = %resource_type,
            records = records.len(),
            "Loading resource type"
        );

        // Keys keep record order so the first record of a duplicate key wins
        let keyed: Vec<(BuilderRecord, Result<NaturalKey>)> = stream::iter(records)
            .map(|record| async move {
                let key = builder.key_components(&record, ctx).await;
                (record, key)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(keyed.len());
        for (record, key) in keyed {
            match key {
                Ok(key) if seen.insert(key.clone()) => pending.push((record, key)),
                Ok(key) => {
                    tracing::debug!(resource_type = %resource_type, key = %key, "Duplicate natural key, dropping record")
                }
                Err(e) => self.record_failure(resource_type, None, e, summary)?,
            }
        }

        let outcomes: Vec<(NaturalKey, Result<RecordOutcome>)> = stream::iter(pending)
            .map(|(record, key)| async move {
                let outcome = self.load_record(builder, &record, &key, ctx).await;
                (key, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for (key, outcome) in outcomes {
            match outcome {
                Ok(RecordOutcome::Submitted(SubmitOutcome::Created)) => {
                    summary.counts_mut(resource_type).created += 1
                }
                Ok(RecordOutcome::Submitted(SubmitOutcome::Updated)) => {
                    summary.counts_mut(resource_type).updated += 1
                }
                Ok(RecordOutcome::DryRun) => summary.counts_mut(resource_type).dry_run += 1,
                Err(e) => self.record_failure(resource_type, Some(&key), e, summary)?,
            }
        }

        let counts = summary.counts_mut(resource_type);
        tracing::info!(
            study_id = %merged.study_id,
            resource_type = %resource_type,
            created = counts.created,
            updated = counts.updated,
            failed = counts.failed,
            skipped = counts.skipped,
            dry_run = counts.dry_run,
            "Resource type loaded"
        );
        Ok(())
    }

    async fn load_record(
        &self,
        builder: &dyn EntityBuilder,
        record: &BuilderRecord,
        key: &NaturalKey,
        ctx: &BuildContext,
    ) -> Result<RecordOutcome> {
        let resource_type = builder.resource_type();
        let existing = builder.query_target_id(key, ctx).await?;
        let mut body = builder.build_entity(record, ctx).await?;
        if let Some(id) = &existing {
            body["id"] = json!(id.as_str());
        }

        if self.dry_run {
            tracing::debug!(
                resource_type = %resource_type,
                key = %key,
                body = %body,
                "Dry run - payload not submitted"
            );
            return Ok(RecordOutcome::DryRun);
        }

        let (id, outcome) = builder.submit(body, ctx).await?;
        tracing::debug!(
            resource_type = %resource_type,
            key = %key,
            id = %id,
            outcome = ?outcome,
            "Submitted resource"
        );
        ctx.remember(resource_type, key, id).await;
        Ok(RecordOutcome::Submitted(outcome))
    }

    /// Counts a failed record, or propagates the error when it is fatal
    fn record_failure(
        &self,
        resource_type: ResourceType,
        key: Option<&NaturalKey>,
        error: StrandError,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        if error.is_fatal() {
            return Err(error);
        }

        let context = match key {
            Some(key) => format!("{resource_type} {key}"),
            None => resource_type.to_string(),
        };

        if let StrandError::MissingField { .. } = error {
            tracing::warn!(context = %context, error = %error, "Skipping record");
            summary.counts_mut(resource_type).skipped += 1;
            return Ok(());
        }

        crate::log_error_with_context!(error, context);
        summary.counts_mut(resource_type).failed += 1;
        summary.add_error(IngestError::from_error(&error).with_context(context));
        Ok(())
    }
}
