//! Disease, Phenotype and VitalStatus

use super::payload::{self, coding, concept, keys, set_opt, SNOMED_SYSTEM, UBERON_SYSTEM};
use super::EntityBuilder;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{distinct_rows, BuilderRecord};
use crate::domain::{DenormalizedRow, MergedStudy, NaturalKey, ResourceType, Result, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

const MONDO_SYSTEM: &str = "http://purl.obolibrary.org/obo/mondo.owl";
const ICD_SYSTEM: &str = "https://www.who.int/classifications/classification-of-diseases";
const HPO_SYSTEM: &str = "http://purl.obolibrary.org/obo/hp.owl";
const CONDITION_CATEGORY_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/condition-category";

/// Patient reference of the row's participant
async fn subject(
    owner: ResourceType,
    row: &DenormalizedRow,
    ctx: &BuildContext,
) -> Result<String> {
    let participant_id = payload::require(row.participant_id(), owner, "participant")?;
    ctx.reference(
        owner,
        ResourceType::Patient,
        &keys::patient(participant_id),
        "patient id",
    )
    .await
}

pub struct DiseaseBuilder;

#[async_trait]
impl EntityBuilder for DiseaseBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Disease
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| row.diagnosis_id().map(str::to_string))
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let row = payload::expect_row(record, self.resource_type())?;
        let diagnosis = payload::require(row.diagnosis.as_ref(), self.resource_type(), "diagnosis")?;
        subject(self.resource_type(), row, ctx).await?;
        Ok(keys::disease(&diagnosis.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let row = payload::expect_row(record, self.resource_type())?;
        let diagnosis = payload::require(row.diagnosis.as_ref(), self.resource_type(), "diagnosis")?;
        let subject = subject(self.resource_type(), row, ctx).await?;

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("https://nih-ncpi.github.io/ncpi-fhir-ig/StructureDefinition/disease"),
                ctx.study_id().as_str(),
            ),
            "identifier": payload::identifiers(
                TableName::Diagnosis,
                &diagnosis.kf_id,
                diagnosis.external_id.as_deref(),
            ),
            "clinicalStatus": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/condition-clinical",
                    "code": "active",
                    "display": "Active",
                }],
                "text": "Active",
            },
            "category": [{
                "coding": [{
                    "system": CONDITION_CATEGORY_SYSTEM,
                    "code": "encounter-diagnosis",
                    "display": "Encounter Diagnosis",
                }],
            }],
            "subject": {"reference": subject},
        });

        let affected_status = row.participant.as_ref().and_then(|p| p.affected_status.as_deref());
        set_opt(
            &mut entity,
            "verificationStatus",
            concept(affected_status, vec![]),
        );
        set_opt(
            &mut entity,
            "code",
            concept(
                diagnosis.source_text_diagnosis.as_deref(),
                vec![
                    coding(MONDO_SYSTEM, diagnosis.mondo_id_diagnosis.as_deref()),
                    coding(ICD_SYSTEM, diagnosis.icd_id_diagnosis.as_deref()),
                    coding(payload::NCIT_SYSTEM, diagnosis.ncit_id_diagnosis.as_deref()),
                ],
            ),
        );
        if let Some(body_site) = concept(
            diagnosis.source_text_tumor_location.as_deref(),
            vec![coding(UBERON_SYSTEM, diagnosis.uberon_id_tumor_location.as_deref())],
        ) {
            entity["bodySite"] = json!([body_site]);
        }
        set_opt(
            &mut entity,
            "_recordedDate",
            payload::relative_date(diagnosis.age_at_event_days),
        );
        Ok(entity)
    }
}

pub struct PhenotypeBuilder;

#[async_trait]
impl EntityBuilder for PhenotypeBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Phenotype
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| row.phenotype.as_ref().map(|p| p.kf_id.clone()))
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let row = payload::expect_row(record, self.resource_type())?;
        let phenotype = payload::require(row.phenotype.as_ref(), self.resource_type(), "phenotype")?;
        subject(self.resource_type(), row, ctx).await?;
        Ok(keys::tagged(ctx.study_id().as_str(), &phenotype.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let row = payload::expect_row(record, self.resource_type())?;
        let phenotype = payload::require(row.phenotype.as_ref(), self.resource_type(), "phenotype")?;
        let subject = subject(self.resource_type(), row, ctx).await?;

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("https://ncpi-fhir.github.io/ncpi-fhir-ig/StructureDefinition/phenotype"),
                ctx.study_id().as_str(),
            ),
            "identifier": payload::identifiers(
                TableName::Phenotype,
                &phenotype.kf_id,
                phenotype.external_id.as_deref(),
            ),
            "category": [{
                "coding": [{
                    "system": CONDITION_CATEGORY_SYSTEM,
                    "code": "encounter-diagnosis",
                    "display": "Encounter Diagnosis",
                }],
            }],
            "subject": {"reference": subject},
        });

        set_opt(
            &mut entity,
            "verificationStatus",
            concept(phenotype.observed.as_deref(), vec![]),
        );
        set_opt(
            &mut entity,
            "code",
            concept(
                phenotype.source_text_phenotype.as_deref(),
                vec![
                    coding(HPO_SYSTEM, phenotype.hpo_id_phenotype.as_deref()),
                    coding(SNOMED_SYSTEM, phenotype.snomed_id_phenotype.as_deref()),
                ],
            ),
        );
        set_opt(
            &mut entity,
            "_recordedDate",
            payload::relative_date(phenotype.age_at_event_days),
        );
        Ok(entity)
    }
}

pub struct VitalStatusBuilder;

#[async_trait]
impl EntityBuilder for VitalStatusBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::VitalStatus
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| row.outcome.as_ref().map(|o| o.kf_id.clone()))
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let row = payload::expect_row(record, self.resource_type())?;
        let outcome = payload::require(row.outcome.as_ref(), self.resource_type(), "outcome")?;
        subject(self.resource_type(), row, ctx).await?;
        Ok(NaturalKey::identifier(&outcome.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let row = payload::expect_row(record, self.resource_type())?;
        let outcome = payload::require(row.outcome.as_ref(), self.resource_type(), "outcome")?;
        let subject = subject(self.resource_type(), row, ctx).await?;

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("https://nih-ncpi.github.io/ncpi-fhir-ig/StructureDefinition/vital-status"),
                ctx.study_id().as_str(),
            ),
            "identifier": payload::identifiers(
                TableName::Outcome,
                &outcome.kf_id,
                outcome.external_id.as_deref(),
            ),
            "status": "final",
            "code": {
                "coding": [{
                    "system": SNOMED_SYSTEM,
                    "code": "263493007",
                    "display": "Clinical status (attribute)",
                }],
                "text": "Clinical status",
            },
            "subject": {"reference": subject},
        });

        set_opt(
            &mut entity,
            "valueCodeableConcept",
            concept(outcome.vital_status.as_deref(), vec![]),
        );
        set_opt(
            &mut entity,
            "_effectiveDateTime",
            payload::relative_date(outcome.age_at_event_days),
        );
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context_with, row};
    use super::*;
    use crate::domain::StrandError;

    async fn patient_context() -> BuildContext {
        context_with(&[(ResourceType::Patient, NaturalKey::identifier("PT_1"), "5")]).await
    }

    #[tokio::test]
    async fn test_disease_payload() {
        let ctx = patient_context().await;
        let record = BuilderRecord::Row(Box::new(row(json!({
            "participant": {"kf_id": "PT_1", "affected_status": "True"},
            "diagnosis": {
                "kf_id": "DG_1",
                "source_text_diagnosis": "Ependymoma",
                "mondo_id_diagnosis": "MONDO:0016698",
                "source_text_tumor_location": "Brain",
                "uberon_id_tumor_location": "UBERON:0000955",
                "age_at_event_days": 1200,
            },
        }))));

        let key = DiseaseBuilder.key_components(&record, &ctx).await.unwrap();
        assert_eq!(key, NaturalKey::identifier("DG_1"));

        let entity = DiseaseBuilder.build_entity(&record, &ctx).await.unwrap();
        assert_eq!(entity["subject"]["reference"], "Patient/5");
        assert_eq!(entity["code"]["coding"][0]["code"], "MONDO:0016698");
        assert_eq!(entity["bodySite"][0]["text"], "Brain");
        assert_eq!(entity["verificationStatus"]["text"], "True");
        assert_eq!(
            entity["_recordedDate"]["extension"][0]["extension"][2]["valueDuration"]["value"],
            1200
        );
    }

    #[tokio::test]
    async fn test_phenotype_key_is_study_scoped() {
        let ctx = patient_context().await;
        let record = BuilderRecord::Row(Box::new(row(json!({
            "participant": {"kf_id": "PT_1"},
            "phenotype": {"kf_id": "PH_1", "observed": "Positive", "hpo_id_phenotype": "HP:0001250"},
        }))));

        let key = PhenotypeBuilder.key_components(&record, &ctx).await.unwrap();
        assert_eq!(key.to_string(), "{_tag=SD_1, identifier=PH_1}");

        let entity = PhenotypeBuilder.build_entity(&record, &ctx).await.unwrap();
        assert_eq!(entity["verificationStatus"]["text"], "Positive");
        assert_eq!(entity["code"]["coding"][0]["system"], HPO_SYSTEM);
        assert!(entity.get("_recordedDate").is_none());
    }

    #[tokio::test]
    async fn test_vital_status_payload() {
        let ctx = patient_context().await;
        let record = BuilderRecord::Row(Box::new(row(json!({
            "participant": {"kf_id": "PT_1"},
            "outcome": {"kf_id": "OC_1", "vital_status": "Alive", "age_at_event_days": 30},
        }))));

        let entity = VitalStatusBuilder.build_entity(&record, &ctx).await.unwrap();
        assert_eq!(entity["valueCodeableConcept"]["text"], "Alive");
        assert!(entity.get("_effectiveDateTime").is_some());
    }

    #[tokio::test]
    async fn test_disease_without_participant_is_missing_field() {
        let ctx = patient_context().await;
        let record = BuilderRecord::Row(Box::new(row(json!({
            "diagnosis": {"kf_id": "DG_1"},
        }))));
        let err = DiseaseBuilder.key_components(&record, &ctx).await.unwrap_err();
        assert!(matches!(err, StrandError::MissingField { ref field, .. } if field == "participant"));
    }
}
