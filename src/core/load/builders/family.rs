//! Family groups and pairwise family relationships

use super::payload::{self, keys};
use super::EntityBuilder;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{family_groups, family_relationships, BuilderRecord};
use crate::domain::records::{FamilyRecord, FamilyRelationshipRecord, StudyRecord};
use crate::domain::{MergedStudy, NaturalKey, ResourceType, Result, StrandError, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

const ROLE_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";

fn family_member_code(text: &str) -> Value {
    json!({
        "coding": [{
            "system": ROLE_CODE_SYSTEM,
            "code": "FAMMEMB",
            "display": "family member",
        }],
        "text": text,
    })
}

pub struct FamilyRelationshipBuilder;

impl FamilyRelationshipBuilder {
    fn relationship<'a>(
        &self,
        record: &'a BuilderRecord,
    ) -> Result<(&'a StudyRecord, &'a FamilyRelationshipRecord)> {
        match record {
            BuilderRecord::FamilyRelationship {
                study,
                relationship,
            } => Ok((study, relationship)),
            _ => Err(StrandError::Validation(
                "family_relationship builder expects a family relationship record".to_string(),
            )),
        }
    }

    async fn endpoints(
        &self,
        relationship: &FamilyRelationshipRecord,
        ctx: &BuildContext,
    ) -> Result<(String, String)> {
        let owner = self.resource_type();
        let participant1 =
            payload::require(relationship.participant1_id.as_deref(), owner, "participant1")?;
        let participant2 =
            payload::require(relationship.participant2_id.as_deref(), owner, "participant2")?;
        let subject = ctx
            .reference(owner, ResourceType::Patient, &keys::patient(participant1), "participant1 patient id")
            .await?;
        let focus = ctx
            .reference(owner, ResourceType::Patient, &keys::patient(participant2), "participant2 patient id")
            .await?;
        Ok((subject, focus))
    }
}

#[async_trait]
impl EntityBuilder for FamilyRelationshipBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::FamilyRelationship
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        family_relationships(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let (study, relationship) = self.relationship(record)?;
        payload::require(
            relationship.participant1_to_participant2_relation.as_deref(),
            self.resource_type(),
            "participant1_to_participant2_relation",
        )?;
        self.endpoints(relationship, ctx).await?;
        Ok(keys::tagged(&study.kf_id, &relationship.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let (study, relationship) = self.relationship(record)?;
        let relation = payload::require(
            relationship.participant1_to_participant2_relation.as_deref(),
            self.resource_type(),
            "participant1_to_participant2_relation",
        )?;
        let (subject, focus) = self.endpoints(relationship, ctx).await?;

        Ok(json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("https://ncpi-fhir.github.io/ncpi-fhir-ig/StructureDefinition/family-relationship"),
                &study.kf_id,
            ),
            "identifier": payload::identifiers(
                TableName::FamilyRelationship,
                &relationship.kf_id,
                relationship.external_id.as_deref(),
            ),
            "status": "final",
            "code": family_member_code("Family Relationship"),
            "subject": {"reference": subject},
            "focus": [{"reference": focus}],
            "valueCodeableConcept": {"text": relation},
        }))
    }
}

pub struct FamilyBuilder;

impl FamilyBuilder {
    fn group<'a>(
        &self,
        record: &'a BuilderRecord,
    ) -> Result<(&'a StudyRecord, &'a FamilyRecord, &'a [String])> {
        match record {
            BuilderRecord::FamilyGroup {
                study,
                family,
                participant_ids,
            } => Ok((study, family, participant_ids)),
            _ => Err(StrandError::Validation(
                "family builder expects a family group record".to_string(),
            )),
        }
    }
}

#[async_trait]
impl EntityBuilder for FamilyBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Family
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        family_groups(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        let (study, family, _) = self.group(record)?;
        Ok(keys::tagged(&study.kf_id, &family.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let (study, family, participant_ids) = self.group(record)?;

        let mut members = Vec::with_capacity(participant_ids.len());
        for participant_id in participant_ids {
            match ctx
                .optional_reference(ResourceType::Patient, &keys::patient(participant_id))
                .await?
            {
                Some(reference) => members.push(json!({
                    "entity": {"reference": reference},
                    "inactive": false,
                })),
                None => tracing::debug!(
                    family = %family.kf_id,
                    participant = %participant_id,
                    "Family member has no patient, leaving it out"
                ),
            }
        }

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("https://nih-ncpi.github.io/ncpi-fhir-ig/StructureDefinition/family"),
                &study.kf_id,
            ),
            "identifier": payload::identifiers(
                TableName::Family,
                &family.kf_id,
                family.external_id.as_deref(),
            ),
            "type": "person",
            "actual": true,
            "code": family_member_code("Family"),
        });
        if !members.is_empty() {
            entity["quantity"] = json!(members.len());
            entity["member"] = Value::Array(members);
        }
        Ok(entity)
    }
}
