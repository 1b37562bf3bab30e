//! Shared state handed to entity builders

use super::cache::IdCache;
use crate::adapters::dataservice::DataserviceApi;
use crate::adapters::drs::{FileMetadataResolver, ResolvedFile};
use crate::adapters::fhir::FhirClient;
use crate::domain::records::GenomicFileRecord;
use crate::domain::{NaturalKey, RemoteId, ResourceType, Result, StrandError, StudyId};
use std::sync::Arc;

/// Everything a builder needs besides its record
pub struct BuildContext {
    study_id: StudyId,
    client: Arc<FhirClient>,
    cache: Arc<IdCache>,
    files: Arc<FileMetadataResolver>,
    dataservice: Option<Arc<DataserviceApi>>,
}

impl BuildContext {
    pub fn new(
        study_id: StudyId,
        client: Arc<FhirClient>,
        cache: Arc<IdCache>,
        files: Arc<FileMetadataResolver>,
        dataservice: Option<Arc<DataserviceApi>>,
    ) -> Self {
        Self {
            study_id,
            client,
            cache,
            files,
            dataservice,
        }
    }

    pub fn study_id(&self) -> &StudyId {
        &self.study_id
    }

    pub fn client(&self) -> &FhirClient {
        &self.client
    }

    /// Remote id of a natural key, through the per-run cache
    pub async fn lookup(
        &self,
        resource_type: ResourceType,
        key: &NaturalKey,
    ) -> Result<Option<RemoteId>> {
        self.cache.resolve(&self.client, resource_type, key).await
    }

    /// Stores the id a submission returned
    pub async fn remember(&self, resource_type: ResourceType, key: &NaturalKey, id: RemoteId) {
        self.cache.store(resource_type, key, id).await;
    }

    /// `<api path>/<id>` reference to the resource behind `key`
    ///
    /// A key nobody has submitted yet is reported as a missing `field` of
    /// the `owner` resource type.
    pub async fn reference(
        &self,
        owner: ResourceType,
        target: ResourceType,
        key: &NaturalKey,
        field: &str,
    ) -> Result<String> {
        match self.lookup(target, key).await? {
            Some(id) => Ok(format!("{}/{}", target.api_path(), id)),
            None => Err(StrandError::missing_field(owner.to_string(), field)),
        }
    }

    /// Reference that is left out of the payload when it cannot be resolved
    pub async fn optional_reference(
        &self,
        target: ResourceType,
        key: &NaturalKey,
    ) -> Result<Option<String>> {
        Ok(self
            .lookup(target, key)
            .await?
            .map(|id| format!("{}/{}", target.api_path(), id)))
    }

    /// Refreshes a genomic file from the dataservice API, then resolves its
    /// metadata and locator
    pub async fn resolve_file(&self, record: &GenomicFileRecord) -> Result<ResolvedFile> {
        let record = match &self.dataservice {
            Some(api) => api.enrich(record).await?,
            None => record.clone(),
        };
        self.files.resolve(&record).await
    }
}
