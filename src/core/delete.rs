//! Study-scoped deletion
//!
//! Removes every resource of one endpoint tagged with a study. The ids are
//! collected with a full paginated scan first, then deleted concurrently. A
//! failed deletion is recorded and the rest still run.

use crate::adapters::fhir::{scan_resource_ids, FhirClient};
use crate::domain::{Result, StudyId};
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};

/// A resource the server did not delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of a study-scoped delete
#[derive(Debug, Clone)]
pub struct DeleteSummary {
    pub endpoint: String,
    /// Distinct resources the search matched
    pub matched: usize,
    pub deleted: usize,
    pub failures: Vec<DeleteFailure>,
    pub duration: Duration,
}

impl DeleteSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Parses extra search parameters written as `k=v&k2=v2`
///
/// `_tag` is reserved for the study id.
pub fn parse_search_params(value: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut params = Vec::new();
    for pair in value.split('&').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, val) = pair
            .split_once('=')
            .ok_or_else(|| format!("search parameter '{pair}' is not of the form key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("search parameter '{pair}' has no name"));
        }
        if key == "_tag" {
            return Err("_tag is set from the study id".to_string());
        }
        params.push((key.to_string(), val.trim().to_string()));
    }
    Ok(params)
}

/// Search filter selecting a study's resources
pub fn study_filter(study_id: &StudyId, extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut filter = vec![("_tag".to_string(), study_id.to_string())];
    filter.extend(extra.iter().cloned());
    filter
}

/// Deletes every `endpoint` resource tagged with `study_id`
///
/// # Errors
///
/// Fails before anything is deleted when the search cannot be completed,
/// including a page walk that does not reach the declared total. Errors of
/// single deletions end up in [`DeleteSummary::failures`].
pub async fn delete_study_resources(
    client: &FhirClient,
    endpoint: &str,
    study_id: &StudyId,
    extra: &[(String, String)],
    max_concurrency: usize,
) -> Result<DeleteSummary> {
    let started = Instant::now();
    let ids = scan_resource_ids(client, endpoint, study_filter(study_id, extra)).await?;
    tracing::info!(
        endpoint,
        study_id = %study_id,
        matched = ids.len(),
        "Deleting tagged resources"
    );

    let matched = ids.len();
    let outcomes: Vec<(String, std::result::Result<(), String>)> = stream::iter(ids)
        .map(|id| async move {
            let outcome = delete_one(client, endpoint, &id).await;
            (id, outcome)
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    let mut deleted = 0;
    let mut failures = Vec::new();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(()) => deleted += 1,
            Err(message) => failures.push(DeleteFailure { id, message }),
        }
    }
    failures.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::info!(
        endpoint,
        deleted,
        failed = failures.len(),
        "Delete completed"
    );

    Ok(DeleteSummary {
        endpoint: endpoint.to_string(),
        matched,
        deleted,
        failures,
        duration: started.elapsed(),
    })
}

async fn delete_one(
    client: &FhirClient,
    endpoint: &str,
    id: &str,
) -> std::result::Result<(), String> {
    let url = client.resource_url(endpoint, id);
    match client.delete(&url).await {
        Ok(response) if (200..300).contains(&response.status) => {
            tracing::debug!(endpoint, id, status = response.status, "Deleted");
            Ok(())
        }
        Ok(response) => {
            let message = format!("status {}: {}", response.status, response.body);
            crate::log_error_with_context!(message, format!("DELETE {url}"));
            Err(message)
        }
        Err(e) => {
            crate::log_error_with_context!(e, format!("DELETE {url}"));
            Err(e.to_string())
        }
    }
}
