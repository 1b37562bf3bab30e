//! Entity builders
//!
//! One builder per output resource type. A builder selects its records from
//! the merged study, derives the natural key that identifies each record on
//! the server, and builds the FHIR payload. Required values are checked while
//! computing the key, so a record missing one is rejected before any network
//! call is made for it.
//!
//! [`registry`] lists the builders in dependency order: a builder only
//! references resource types that come before it.

mod biospecimen;
mod clinical;
mod document;
mod family;
mod investigator;
mod participant;
pub mod payload;
mod study;

use super::context::BuildContext;
use super::record::BuilderRecord;
use crate::adapters::fhir::{submit, SubmitOutcome};
use crate::domain::{MergedStudy, NaturalKey, RemoteId, ResourceType, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use biospecimen::{HistopathologyBuilder, SequencingCenterBuilder, SpecimenBuilder};
pub use clinical::{DiseaseBuilder, PhenotypeBuilder, VitalStatusBuilder};
pub use document::DrsDocumentReferenceBuilder;
pub use family::{FamilyBuilder, FamilyRelationshipBuilder};
pub use investigator::{OrganizationBuilder, PractitionerBuilder, PractitionerRoleBuilder};
pub use participant::{PatientBuilder, ProbandStatusBuilder, ResearchSubjectBuilder};
pub use study::ResearchStudyBuilder;

/// Builds one FHIR resource type from merged study data
#[async_trait]
pub trait EntityBuilder: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    /// Input records of this builder
    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord>;

    /// Natural key of a record
    ///
    /// # Errors
    ///
    /// [`crate::domain::StrandError::MissingField`] when a required value
    /// or reference is absent.
    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext)
        -> Result<NaturalKey>;

    /// Remote id currently holding the key, if any
    async fn query_target_id(
        &self,
        key: &NaturalKey,
        ctx: &BuildContext,
    ) -> Result<Option<RemoteId>> {
        ctx.lookup(self.resource_type(), key).await
    }

    /// FHIR payload of a record, without `id`
    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value>;

    /// Sends a payload with the update-else-create protocol
    async fn submit(&self, body: Value, ctx: &BuildContext) -> Result<(RemoteId, SubmitOutcome)> {
        submit(ctx.client(), self.resource_type().api_path(), body).await
    }
}

/// Every builder in dependency order
pub fn registry() -> Vec<Arc<dyn EntityBuilder>> {
    ResourceType::ALL.iter().map(|t| builder_for(*t)).collect()
}

/// Builder of one resource type
pub fn builder_for(resource_type: ResourceType) -> Arc<dyn EntityBuilder> {
    match resource_type {
        ResourceType::Practitioner => Arc::new(PractitionerBuilder),
        ResourceType::Organization => Arc::new(OrganizationBuilder),
        ResourceType::PractitionerRole => Arc::new(PractitionerRoleBuilder),
        ResourceType::Patient => Arc::new(PatientBuilder),
        ResourceType::ProbandStatus => Arc::new(ProbandStatusBuilder),
        ResourceType::FamilyRelationship => Arc::new(FamilyRelationshipBuilder),
        ResourceType::Family => Arc::new(FamilyBuilder),
        ResourceType::ResearchStudy => Arc::new(ResearchStudyBuilder),
        ResourceType::ResearchSubject => Arc::new(ResearchSubjectBuilder),
        ResourceType::Disease => Arc::new(DiseaseBuilder),
        ResourceType::Phenotype => Arc::new(PhenotypeBuilder),
        ResourceType::VitalStatus => Arc::new(VitalStatusBuilder),
        ResourceType::SequencingCenter => Arc::new(SequencingCenterBuilder),
        ResourceType::Specimen => Arc::new(SpecimenBuilder),
        ResourceType::Histopathology => Arc::new(HistopathologyBuilder),
        ResourceType::DrsDocumentReference => Arc::new(DrsDocumentReferenceBuilder),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures for builder tests: a context backed by a mockito FHIR server

    use super::super::cache::IdCache;
    use super::super::context::BuildContext;
    use crate::adapters::drs::{FederatedMetadata, FederatedMetadataSource, FileMetadataResolver};
    use crate::adapters::fhir::FhirClient;
    use crate::config::{FhirConfig, FilesConfig, RetryConfig};
    use crate::domain::{DenormalizedRow, NaturalKey, RemoteId, ResourceType, Result, StudyId};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct NoFederated;

    #[async_trait]
    impl FederatedMetadataSource for NoFederated {
        async fn fetch(&self, _object_id: &str) -> Result<FederatedMetadata> {
            Ok(FederatedMetadata::default())
        }
    }

    /// FHIR settings pointing at `base_url`, without retries
    pub fn fhir_config(base_url: &str) -> FhirConfig {
        FhirConfig {
            base_url: base_url.to_string(),
            username: None,
            password: None,
            cookie: None,
            placeholder_host: "http://localhost:8000".to_string(),
            timeout_seconds: 5,
            tls_verify: true,
            retry: RetryConfig {
                max_retries: 0,
                initial_delay_ms: 1,
                max_delay_ms: 1,
                backoff_multiplier: 1.0,
            },
        }
    }

    /// Resolver with local host `data.example` and no reachable federated store
    pub fn files() -> Arc<FileMetadataResolver> {
        let files = FilesConfig {
            default_drs_host: "data.example".to_string(),
            federated_host: Some("federated.example".to_string()),
            ..FilesConfig::default()
        };
        Arc::new(FileMetadataResolver::new(&files, Arc::new(NoFederated)).unwrap())
    }

    pub fn context(base_url: &str) -> BuildContext {
        BuildContext::new(
            StudyId::new("SD_1").unwrap(),
            Arc::new(FhirClient::new(fhir_config(base_url)).unwrap()),
            Arc::new(IdCache::new()),
            files(),
            None,
        )
    }

    /// Context whose cache already knows the given ids
    pub async fn context_with(known: &[(ResourceType, NaturalKey, &str)]) -> BuildContext {
        context_on("http://127.0.0.1:9", known).await
    }

    /// Like [`context_with`], with lookups of unknown keys going to `base_url`
    pub async fn context_on(
        base_url: &str,
        known: &[(ResourceType, NaturalKey, &str)],
    ) -> BuildContext {
        let ctx = context(base_url);
        for (resource_type, key, id) in known {
            ctx.remember(*resource_type, key, RemoteId::new(*id).unwrap())
                .await;
        }
        ctx
    }

    pub fn record<T: serde::de::DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    /// Row with a visible study `SD_1` and the given slots
    pub fn row(slots: Value) -> DenormalizedRow {
        let mut row = DenormalizedRow {
            study: Some(record(json!({
                "kf_id": "SD_1",
                "visible": true,
                "external_id": "phs001138.c1",
                "version": "v1.p1",
                "name": "Test Study",
                "domain": "CANCER",
                "program": "Kids First",
                "short_code": "KF-TEST",
            }))),
            ..Default::default()
        };
        let slots = slots.as_object().cloned().unwrap_or_default();
        for (slot, value) in slots {
            let mut value = value;
            value["visible"] = json!(true);
            match slot.as_str() {
                "investigator" => row.investigator = Some(record(value)),
                "participant" => row.participant = Some(record(value)),
                "family" => row.family = Some(record(value)),
                "diagnosis" => row.diagnosis = Some(record(value)),
                "phenotype" => row.phenotype = Some(record(value)),
                "outcome" => row.outcome = Some(record(value)),
                "biospecimen" => row.biospecimen = Some(record(value)),
                "biospecimen_diagnosis" => row.biospecimen_diagnosis = Some(record(value)),
                "genomic_file" => row.genomic_file = Some(record(value)),
                "sequencing_experiment" => row.sequencing_experiment = Some(record(value)),
                other => panic!("unknown slot {other}"),
            }
        }
        row
    }
}
