//! Natural-key resolver
//!
//! Answers "which remote ids match this natural key" by scanning the resource
//! type's endpoint with the key as search filter. Reuse across a run is the
//! caller's concern; see the load stage's id cache.

use super::client::FhirClient;
use super::scanner::scan_resource_ids;
use crate::domain::{NaturalKey, RemoteId, ResourceType, Result, StrandError};

/// Returns every remote id matching `key` for the given resource type
pub async fn query_target_ids(
    client: &FhirClient,
    resource_type: ResourceType,
    key: &NaturalKey,
) -> Result<Vec<RemoteId>> {
    let ids = scan_resource_ids(client, resource_type.api_path(), key.params().to_vec()).await?;

    tracing::debug!(
        resource_type = %resource_type,
        key = %key,
        matches = ids.len(),
        "Resolved natural key"
    );

    ids.into_iter()
        .map(|id| RemoteId::new(id).map_err(StrandError::Validation))
        .collect()
}
